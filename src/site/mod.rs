//! Sites are the managed residential complexes at the top of the site → block → unit tree.

mod db;
mod endpoints;

pub use db::{
    CascadeDeletion, Site, SiteForm, SiteId, SiteSummary, create_site, create_site_table,
    delete_site, get_all_sites, get_site, normalize_iban, update_site,
};
pub use endpoints::{
    create_site_endpoint, delete_site_endpoint, get_site_endpoint, get_sites_endpoint,
    update_site_endpoint,
};
