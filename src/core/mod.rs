pub mod apply;
pub mod bdd_manager;
pub mod bdd_node;
pub mod error;
pub mod gc;
pub mod ite;
pub mod quant;
pub mod reorder;
pub mod subst;
pub mod swap;

#[cfg(test)]
pub mod test;
