// Pipeline storage: persisting the final dataset

pub mod parquet_out;

pub use parquet_out::write_parquet;
