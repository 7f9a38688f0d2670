pub mod moments;
