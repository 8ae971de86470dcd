pub mod bdd_view;
