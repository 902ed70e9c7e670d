mod aggregate;
mod assemble;
mod barcode;
mod matcher;
mod run;
mod summary;
#[cfg(test)]
mod tests;

pub use run::run;
