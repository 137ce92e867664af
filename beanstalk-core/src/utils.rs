//! Utility functions for the container
//!
//! Naming helpers used for default bean names, and static analysis of the
//! declared dependency graph.

/// Naming convention utilities for bean names
pub mod naming {
    /// Converts a PascalCase type name to camelCase for bean naming.
    ///
    /// `UserService` becomes `userService`.
    ///
    /// # Examples
    ///
    /// ```
    /// use beanstalk_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("UserService"), "userService");
    /// assert_eq!(to_camel_case("A"), "a");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }
}

/// Dependency graph analysis
pub mod dependency {
    use std::collections::{HashMap, HashSet};

    /// A declared edge `from -> to`.
    ///
    /// `hard` edges (constructor arguments, explicit depends-on, or any edge
    /// touching a non-singleton) cannot be broken by early exposure.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Edge {
        pub to: String,
        pub hard: bool,
    }

    /// Dependency graph analysis result
    #[derive(Debug, PartialEq, Eq)]
    pub enum DependencyValidationError {
        /// A cycle that early exposure cannot resolve
        CircularDependency {
            /// The dependency chain forming the cycle
            cycle: Vec<String>,
        },
        /// Missing dependency detected
        MissingDependency {
            /// The bean that requires the dependency
            bean: String,
            /// The missing dependency
            missing: String,
        },
    }

    impl std::fmt::Display for DependencyValidationError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::CircularDependency { cycle } => {
                    write!(f, "Unresolvable circular dependency: {}", cycle.join(" -> "))
                }
                Self::MissingDependency { bean, missing } => {
                    write!(f, "Bean '{}' depends on '{}' which is not registered", bean, missing)
                }
            }
        }
    }

    /// Validates a dependency graph.
    ///
    /// Reports the first missing named dependency, then the first cycle made
    /// only of hard edges. Cycles that include at least one soft edge (a
    /// property injection between singletons) are resolvable at runtime and
    /// are not reported. Nodes are visited in the order given by `order`, so
    /// the result is deterministic.
    pub fn validate_dependency_graph(
        order: &[String],
        graph: &HashMap<String, Vec<Edge>>,
    ) -> Result<(), DependencyValidationError> {
        for bean in order {
            for edge in graph.get(bean).into_iter().flatten() {
                if !graph.contains_key(&edge.to) {
                    return Err(DependencyValidationError::MissingDependency {
                        bean: bean.clone(),
                        missing: edge.to.clone(),
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for bean in order {
            if !visited.contains(bean) {
                if let Some(cycle) = detect_hard_cycle(bean, graph, &mut visited, &mut stack) {
                    return Err(DependencyValidationError::CircularDependency { cycle });
                }
            }
        }

        Ok(())
    }

    fn detect_hard_cycle(
        node: &str,
        graph: &HashMap<String, Vec<Edge>>,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        for edge in graph.get(node).into_iter().flatten().filter(|e| e.hard) {
            if let Some(start) = stack.iter().position(|n| n == &edge.to) {
                let mut cycle = stack[start..].to_vec();
                cycle.push(edge.to.clone());
                return Some(cycle);
            }
            if !visited.contains(&edge.to) {
                if let Some(cycle) = detect_hard_cycle(&edge.to, graph, visited, stack) {
                    return Some(cycle);
                }
            }
        }

        stack.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    mod naming_tests {
        use super::super::naming::*;

        #[test]
        fn test_to_camel_case() {
            assert_eq!(to_camel_case("UserService"), "userService");
            assert_eq!(to_camel_case("DatabaseService"), "databaseService");
            assert_eq!(to_camel_case("A"), "a");
            assert_eq!(to_camel_case("AB"), "aB");
            assert_eq!(to_camel_case(""), "");
            assert_eq!(to_camel_case("lowerCase"), "lowerCase");
        }
    }

    mod dependency_tests {
        use super::super::dependency::*;
        use std::collections::HashMap;

        fn hard(to: &str) -> Edge {
            Edge { to: to.to_string(), hard: true }
        }

        fn soft(to: &str) -> Edge {
            Edge { to: to.to_string(), hard: false }
        }

        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        #[test]
        fn test_validate_missing_dependency() {
            let mut graph = HashMap::new();
            graph.insert("serviceA".to_string(), vec![soft("serviceB")]);

            let result = validate_dependency_graph(&names(&["serviceA"]), &graph);
            assert_eq!(
                result,
                Err(DependencyValidationError::MissingDependency {
                    bean: "serviceA".to_string(),
                    missing: "serviceB".to_string(),
                })
            );
        }

        #[test]
        fn test_hard_cycle_is_reported() {
            let mut graph = HashMap::new();
            graph.insert("serviceA".to_string(), vec![hard("serviceB")]);
            graph.insert("serviceB".to_string(), vec![hard("serviceC")]);
            graph.insert("serviceC".to_string(), vec![hard("serviceA")]);

            let order = names(&["serviceA", "serviceB", "serviceC"]);
            match validate_dependency_graph(&order, &graph) {
                Err(DependencyValidationError::CircularDependency { cycle }) => {
                    assert_eq!(cycle, names(&["serviceA", "serviceB", "serviceC", "serviceA"]));
                }
                other => panic!("Expected CircularDependency error, got {:?}", other),
            }
        }

        #[test]
        fn test_cycle_with_soft_edge_is_resolvable() {
            let mut graph = HashMap::new();
            graph.insert("serviceA".to_string(), vec![hard("serviceB")]);
            graph.insert("serviceB".to_string(), vec![soft("serviceA")]);

            let order = names(&["serviceA", "serviceB"]);
            assert!(validate_dependency_graph(&order, &graph).is_ok());
        }

        #[test]
        fn test_self_dependency() {
            let mut graph = HashMap::new();
            graph.insert("serviceA".to_string(), vec![hard("serviceA")]);

            match validate_dependency_graph(&names(&["serviceA"]), &graph) {
                Err(DependencyValidationError::CircularDependency { cycle }) => {
                    assert_eq!(cycle.len(), 2);
                }
                other => panic!("Expected CircularDependency error, got {:?}", other),
            }
        }

        #[test]
        fn test_validate_valid_graph() {
            let mut graph = HashMap::new();
            graph.insert("config".to_string(), vec![]);
            graph.insert("database".to_string(), vec![hard("config")]);
            graph.insert("userService".to_string(), vec![hard("database"), soft("config")]);

            let order = names(&["config", "database", "userService"]);
            assert!(validate_dependency_graph(&order, &graph).is_ok());
        }
    }
}
