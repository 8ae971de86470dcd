#[cfg(test)]
pub mod tests {
    use num_bigint::BigUint;

    use crate::{
        core::{
            bdd_manager::BddManager,
            bdd_node::{Edge, FALSE, TRUE},
        },
        misc::hash_select::HashSet,
        util::sat::Assignment,
    };

    /// A manually constructed BDD plus truth table, allowing verification
    /// of any other BDD against it for testing whether it represents the
    /// same function.
    ///
    /// Variables are named `v1` through `vN`; each entry of `ones` lists
    /// the variables assigned `true` in one satisfying minterm.
    pub struct TestCase {
        ones: HashSet<Vec<usize>>,
        pub man: BddManager,
        pub f: Edge,
        pub nr_variables: usize,
    }

    impl TestCase {
        /// Three variables, five minterms:
        /// ~a~b~c + ~abc + a~b~c + a~bc + abc
        pub fn test_trivial() -> TestCase {
            let ones = HashSet::from_iter([
                vec![],
                vec![2, 3],
                vec![1],
                vec![1, 3],
                vec![1, 2, 3],
            ]);
            Self::from_ones(ones, 3)
        }

        /// Eight variables, an arbitrary dense truth table.
        pub fn random_1() -> TestCase {
            TestCase::from_truthtable(vec![
                [1, 0, 0, 1, 1, 0, 1, 0],
                [0, 1, 1, 0, 0, 1, 0, 1],
                [1, 1, 0, 0, 1, 0, 0, 1],
                [0, 0, 1, 1, 0, 1, 1, 0],
                [1, 0, 1, 0, 1, 0, 1, 1],
                [0, 1, 0, 1, 0, 1, 0, 0],
                [1, 1, 1, 0, 0, 0, 1, 0],
                [0, 0, 0, 1, 1, 1, 0, 1],
                [1, 0, 1, 1, 0, 0, 0, 1],
                [0, 1, 0, 0, 1, 1, 1, 0],
                [1, 1, 0, 1, 0, 0, 1, 1],
                [0, 0, 1, 0, 1, 1, 0, 0],
                [1, 0, 0, 0, 0, 1, 1, 1],
                [0, 1, 1, 1, 1, 0, 0, 0],
                [1, 1, 1, 1, 0, 1, 0, 1],
                [0, 0, 0, 0, 1, 0, 1, 1],
                [1, 0, 1, 0, 0, 1, 0, 0],
                [0, 1, 0, 1, 1, 0, 1, 1],
                [1, 1, 0, 0, 0, 1, 1, 0],
                [0, 0, 1, 1, 1, 0, 0, 1],
                [1, 0, 0, 1, 0, 1, 0, 1],
                [0, 1, 1, 0, 1, 0, 1, 0],
                [1, 1, 1, 0, 1, 1, 0, 0],
                [0, 0, 0, 1, 0, 0, 1, 1],
                [1, 0, 1, 1, 1, 1, 1, 0],
                [0, 1, 0, 0, 0, 0, 0, 1],
                [1, 1, 0, 1, 1, 1, 0, 0],
                [0, 0, 1, 0, 0, 0, 1, 1],
                [1, 0, 0, 0, 1, 0, 0, 0],
                [0, 1, 1, 1, 0, 1, 1, 1],
                [1, 1, 1, 1, 1, 0, 1, 1],
                [0, 0, 0, 0, 0, 1, 0, 0],
                [1, 0, 1, 0, 1, 1, 1, 1],
                [0, 1, 0, 1, 0, 0, 0, 0],
                [1, 0, 0, 1, 1, 1, 1, 1],
                [0, 1, 1, 0, 0, 0, 0, 0],
                [1, 1, 0, 0, 1, 1, 0, 1],
                [0, 0, 1, 1, 0, 0, 1, 0],
                [1, 1, 1, 0, 0, 1, 1, 1],
                [0, 0, 0, 1, 1, 0, 0, 0],
            ])
        }

        fn from_truthtable<const N: usize>(table: Vec<[u8; N]>) -> TestCase {
            let ones: HashSet<Vec<usize>> = table
                .iter()
                .map(|row| {
                    row.iter()
                        .enumerate()
                        .filter(|(_, &bit)| bit != 0)
                        .map(|(var, _)| var + 1)
                        .collect()
                })
                .collect();
            Self::from_ones(ones, N)
        }

        fn from_ones(ones: HashSet<Vec<usize>>, nr_variables: usize) -> TestCase {
            let mut man = BddManager::default();
            let names: Vec<String> = (1..=nr_variables).map(|i| format!("v{i}")).collect();
            for name in &names {
                man.add_var(name, None).unwrap();
            }
            let mut f = FALSE;
            for minterm in &ones {
                let mut c = TRUE;
                for var in 1..=nr_variables {
                    let mut v = man.var(&names[var - 1]).unwrap();
                    if !minterm.contains(&var) {
                        v = -v;
                    }
                    c = man.and(c, v).unwrap();
                }
                f = man.or(f, c).unwrap();
            }
            TestCase {
                ones,
                man,
                f,
                nr_variables,
            }
        }

        /// Test whether a function in some other BDD matches this
        /// testcase.
        #[must_use]
        pub fn verify_against(&self, other_man: &BddManager, other_f: Edge) -> bool {
            for trues in self.ones.iter() {
                let assignment: Assignment = (1..=self.nr_variables)
                    .map(|var| (format!("v{var}"), trues.contains(&var)))
                    .collect();
                if !other_man.evaluate(other_f, &assignment).unwrap() {
                    eprintln!("f({trues:?}=1) should be 1, but is not!");
                    return false;
                }
            }
            let count = other_man
                .sat_count(other_f, Some(self.nr_variables))
                .unwrap();
            if count != BigUint::from(self.ones.len()) {
                eprintln!("sat count is {}, but should be {}", count, self.ones.len());
                return false;
            }
            true
        }
    }

    #[test]
    fn testcase_agrees_with_itself() {
        for testcase in [TestCase::test_trivial(), TestCase::random_1()] {
            assert!(testcase.verify_against(&testcase.man, testcase.f));
        }
    }

    #[test]
    fn equal_functions_intern_to_equal_edges() {
        // two different construction orders of the same function yield
        // the identical signed id
        let mut man = BddManager::default();
        man.declare(&["a", "b", "c"]).unwrap();
        let a = man.var("a").unwrap();
        let b = man.var("b").unwrap();
        let c = man.var("c").unwrap();
        let left = {
            let ab = man.and(a, b).unwrap();
            man.or(ab, c).unwrap()
        };
        let right = {
            let ac = man.or(a, c).unwrap();
            let bc = man.or(b, c).unwrap();
            man.and(ac, bc).unwrap()
        };
        assert_eq!(left, right);
    }
}
