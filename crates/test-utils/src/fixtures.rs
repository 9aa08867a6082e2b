//! Common test fixtures for granule search and download tests.
//!
//! Feed bodies mirror the shape of CMR `granules.json` pages; only the
//! fields the pipeline reads are filled in, plus a few it must ignore.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

/// Asset link shapes found in real granule entries.
pub mod assets {
    /// Data file, https, HDF5
    pub const VNP09GA_H06V11: &str =
        "https://e4ftl01.cr.usgs.gov/VIIRS/VNP09GA.001/2021.10.17/VNP09GA.A2021290.h06v11.001.2021291083217.h5";

    /// Data file, https, HDF5
    pub const VNP09GA_H07V05: &str =
        "https://e4ftl01.cr.usgs.gov/VIIRS/VNP09GA.001/2021.10.17/VNP09GA.A2021290.h07v05.001.2021291083301.h5";

    /// Same granule over plain http
    pub const VNP09GA_HTTP: &str =
        "http://e4ftl01.cr.usgs.gov/VIIRS/VNP09GA.001/2021.10.17/VNP09GA.A2021290.h06v11.001.2021291083217.h5";

    /// Same granule in the cloud bucket
    pub const VNP09GA_S3: &str =
        "s3://lp-prod-protected/VNP09GA.001/VNP09GA.A2021290.h06v11.001.2021291083217.h5";

    /// Metadata sidecar
    pub const VNP09GA_XML: &str =
        "https://e4ftl01.cr.usgs.gov/VIIRS/VNP09GA.001/2021.10.17/VNP09GA.A2021290.h06v11.001.2021291083217.h5.xml";

    /// Browse image
    pub const VNP09GA_BROWSE: &str =
        "https://e4ftl01.cr.usgs.gov/WORKING/BRWS/Browse.001/2021.10.18/BROWSE.VNP09GA.A2021290.h06v11.001.2021291083217.1.jpg";
}

/// One feed entry with the given link hrefs.
pub fn granule_entry(id: &str, hrefs: &[&str]) -> Value {
    let links: Vec<Value> = hrefs
        .iter()
        .map(|href| {
            json!({
                "rel": "http://esipfed.org/ns/fedsearch/1.1/data#",
                "hreflang": "en-US",
                "href": href,
            })
        })
        .collect();

    json!({
        "id": id,
        "title": format!("granule {id}"),
        "time_start": "2021-10-17T00:00:00.000Z",
        "links": links,
    })
}

/// A full `granules.json` page; each inner slice becomes one entry.
pub fn granule_feed(entries: &[&[&str]]) -> String {
    let entries: Vec<Value> = entries
        .iter()
        .enumerate()
        .map(|(i, hrefs)| granule_entry(&format!("G{}-LPDAAC_ECS", i + 1), hrefs))
        .collect();

    json!({
        "feed": {
            "updated": "2021-10-19T00:00:00.000Z",
            "id": "https://cmr.earthdata.nasa.gov:443/search/granules.json",
            "title": "ECHO granule metadata",
            "entry": entries,
        }
    })
    .to_string()
}

/// A page with no entries.
pub fn empty_feed() -> String {
    granule_feed(&[])
}

/// One netrc `machine` stanza.
pub fn netrc_entry(host: &str, login: &str, password: &str) -> String {
    format!("machine {host}\n    login {login}\n    password {password}\n")
}

/// Writes `contents` to `<dir>/.netrc` and returns the path.
pub fn write_netrc(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join(".netrc");
    std::fs::write(&path, contents).expect("Failed to write netrc fixture");
    path
}
