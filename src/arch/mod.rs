pub mod smiv;
