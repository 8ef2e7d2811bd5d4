pub mod price_file;
