pub mod sale_incentive_repo;
pub use sale_incentive_repo::SaleIncentiveRepository;
pub mod lead_repo;
pub use lead_repo::LeadRepository;
