//! Price data sources.

pub mod agmarknet;
pub mod datagov;
pub mod provider;

pub use agmarknet::{
    fetch_basmati_prices_csv, AgmarknetClient, BasmatiSource, MandiPrice, PriceQuery,
};
pub use datagov::{fetch_datagov_prices_csv, DataGovClient, DataGovQuery, DataGovSource};
pub use provider::{fetch_to_csv, DataError, HttpSettings, JsonClient, PriceSource};
