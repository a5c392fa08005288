pub mod deal;
pub mod pro_forma;
