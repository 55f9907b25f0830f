//! Lookup of live resources by human-readable key.
//!
//! Every lookup lists the relevant collection page by page and filters
//! client-side. "No match" is a normal outcome (`Ok(None)`); only listing
//! failures are errors.

mod keys;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::client::{ApiRequest, ResourceClient};
use crate::desired::Location;
use crate::error::ReconcileError;
use crate::model::{FloatingIpRecord, FloatingIpSnapshot, NetworkSnapshot, VmRecord, VmSnapshot};

pub use keys::{FloatingIpKey, VmKey};

/// Entries requested per listing page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound on pages fetched by a single lookup.
pub const MAX_PAGES: u32 = 1000;

const NETWORKS_PATH: &str = "network/networks";
const VMS_PATH: &str = "user-resource/vm/list";
const FLOATING_IPS_PATH: &str = "network/ip_addresses";

/// Read-only resolver bound to one client and one location.
#[derive(Debug)]
pub struct Locator<'c, C: ?Sized> {
    client: &'c C,
    location: Location,
    page_size: u32,
}

impl<'c, C: ResourceClient + ?Sized> Locator<'c, C> {
    /// Creates a locator using [`DEFAULT_PAGE_SIZE`].
    #[must_use]
    pub const fn new(client: &'c C, location: Location) -> Self {
        Self {
            client,
            location,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Overrides the listing page size. Zero is treated as one.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = if page_size == 0 { 1 } else { page_size };
        self
    }

    /// Finds a network by name.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub async fn network_by_name(
        &self,
        name: &str,
    ) -> Result<Option<NetworkSnapshot>, ReconcileError> {
        self.find(NETWORKS_PATH, "list networks", |network: &NetworkSnapshot| {
            network.name == name
        })
        .await
    }

    /// Finds a VM and the floating IP assigned to it.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub async fn vm(&self, key: &VmKey) -> Result<Option<VmSnapshot>, ReconcileError> {
        let found = self
            .find(VMS_PATH, "list VMs", |vm: &VmRecord| key.matches(vm))
            .await?;
        let Some(record) = found else {
            return Ok(None);
        };

        // Private addresses repeat across networks: an address assigned to
        // this VM's uuid wins over one matching only its private IPv4.
        let uuid = record.uuid.clone();
        let private_ipv4 = record.private_ipv4.clone();
        let mut by_private: Option<FloatingIpRecord> = None;
        let by_uuid = self
            .find(FLOATING_IPS_PATH, "list floating IPs", |ip: &FloatingIpRecord| {
                if ip.assigned_to.as_deref() == Some(uuid.as_str()) {
                    return true;
                }
                if by_private.is_none()
                    && private_ipv4.is_some()
                    && ip.assigned_to_private_ip == private_ipv4
                {
                    by_private = Some(ip.clone());
                }
                false
            })
            .await?;
        let public = by_uuid.or(by_private).map(|ip| ip.address);
        Ok(Some(VmSnapshot::from_record(record, public)))
    }

    /// Finds a floating IP.
    ///
    /// # Errors
    ///
    /// Propagates listing failures.
    pub async fn floating_ip(
        &self,
        key: &FloatingIpKey,
    ) -> Result<Option<FloatingIpSnapshot>, ReconcileError> {
        let found = self
            .find(
                FLOATING_IPS_PATH,
                "list floating IPs",
                |ip: &FloatingIpRecord| key.matches(ip),
            )
            .await?;
        Ok(found.map(FloatingIpSnapshot::from))
    }

    /// Pages through `suffix` until `predicate` matches an entry.
    ///
    /// Paging stops at the first match, an empty page, a page shorter than
    /// the page size, or a page identical to the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Provider`] for a non-2xx listing response and
    /// [`ReconcileError::UnexpectedResponse`] when the body is not an array of
    /// decodable entries or the listing never ends.
    pub async fn find<T, P>(
        &self,
        suffix: &str,
        operation: &str,
        mut predicate: P,
    ) -> Result<Option<T>, ReconcileError>
    where
        T: DeserializeOwned,
        P: FnMut(&T) -> bool + Send,
    {
        let path = self.location.path(suffix);
        let mut previous: Option<Vec<Value>> = None;

        for page in 1..=MAX_PAGES {
            let request = ApiRequest::get(path.clone())
                .query("page", page)
                .query("limit", self.page_size);
            let response = self.client.request(request).await?;
            if !response.is_success() {
                return Err(ReconcileError::Provider {
                    operation: operation.to_owned(),
                    status: response.status,
                    body: response.body,
                });
            }
            let Value::Array(entries) = response.body else {
                return Err(ReconcileError::unexpected(
                    operation,
                    "listing body is not an array",
                ));
            };
            debug!(%path, page, entries = entries.len(), "listing page received");

            if entries.is_empty() || previous.as_ref() == Some(&entries) {
                return Ok(None);
            }
            for entry in &entries {
                let candidate: T = serde_json::from_value(entry.clone())
                    .map_err(|err| ReconcileError::unexpected(operation, err.to_string()))?;
                if predicate(&candidate) {
                    return Ok(Some(candidate));
                }
            }
            if entries.len() < self.page_size as usize {
                return Ok(None);
            }
            previous = Some(entries);
        }

        Err(ReconcileError::unexpected(
            operation,
            format!("listing did not end within {MAX_PAGES} pages"),
        ))
    }
}
