pub mod forecast;
pub mod scenario;

pub use forecast::ForecastConfig;
pub use scenario::Scenario;
