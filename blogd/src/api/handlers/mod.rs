pub mod health;
pub mod site;
pub mod static_assets;
