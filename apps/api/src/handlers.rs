pub mod backups;
pub mod health;
pub mod iaas;
pub mod instances;
pub mod stats;
pub mod structure;
pub mod worker;

#[cfg(test)]
mod test_support;
