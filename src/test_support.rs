//! Test support utilities shared across unit and integration tests.
//!
//! [`FakeCloud`] is an in-memory provider speaking the same wire format as
//! the real API. It pages listings, records every request, can inject
//! one-shot failures and can be saved to and restored from JSON so the
//! binary can be exercised end to end without network access.

use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use uuid::Uuid;

use crate::client::{
    ApiRequest, ApiResponse, ClientFuture, Method, RequestBody, ResourceClient,
};

/// Status a VM reports once started.
pub const STATUS_RUNNING: &str = "running";
/// Status a VM reports once stopped.
pub const STATUS_STOPPED: &str = "stopped";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct FakeNetwork {
    uuid: String,
    name: String,
    subnet: String,
    is_default: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct FakeDisk {
    uuid: String,
    name: String,
    size: u32,
    primary: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct FakeVm {
    uuid: String,
    name: String,
    hostname: String,
    vcpu: u32,
    memory: u32,
    private_ipv4: String,
    billing_account: u64,
    status: String,
    network_uuid: String,
    storage: Vec<FakeDisk>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct FakeIp {
    uuid: String,
    name: String,
    address: String,
    assigned_to: Option<String>,
    assigned_to_private_ip: Option<String>,
    enabled: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct CloudState {
    networks: Vec<FakeNetwork>,
    vms: Vec<FakeVm>,
    floating_ips: Vec<FakeIp>,
    detached_disks: Vec<FakeDisk>,
    next_octet: u32,
    ignore_paging: bool,
    require_stopped_for_resize: bool,
}

#[derive(Clone, Debug)]
struct Failure {
    method: Method,
    path_suffix: String,
    status: u16,
    body: Value,
}

#[derive(Debug, Default)]
struct Inner {
    state: CloudState,
    failures: Vec<Failure>,
    requests: Vec<ApiRequest>,
}

/// Stateful in-memory provider implementing [`ResourceClient`].
///
/// Clones share state, so a test can keep a handle for assertions while the
/// engine borrows another.
#[derive(Clone, Debug, Default)]
pub struct FakeCloud {
    inner: Arc<Mutex<Inner>>,
}

const fn ok(body: Value) -> ApiResponse {
    ApiResponse::new(200, body)
}

fn error(status: u16, message: &str) -> ApiResponse {
    ApiResponse::new(status, json!({ "message": message }))
}

fn form_value<'r>(request: &'r ApiRequest, key: &str) -> Option<&'r str> {
    request.param(key)
}

fn json_value<'r>(request: &'r ApiRequest, key: &str) -> Option<&'r str> {
    match &request.body {
        RequestBody::Json(body) => body.get(key).and_then(Value::as_str),
        RequestBody::Empty | RequestBody::Form(_) => None,
    }
}

fn number(request: &ApiRequest, key: &str) -> Option<u32> {
    form_value(request, key).and_then(|raw| raw.parse().ok())
}

fn to_value<T: Serialize>(item: &T) -> Value {
    serde_json::to_value(item).unwrap_or(Value::Null)
}

fn free_disk_name(storage: &[FakeDisk]) -> String {
    ('a'..='z')
        .map(|letter| format!("vd{letter}"))
        .find(|name| storage.iter().all(|disk| disk.name != *name))
        .unwrap_or_else(|| String::from("vdz"))
}

impl FakeCloud {
    /// Creates an empty cloud.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    const fn next_octet(state: &mut CloudState) -> u32 {
        state.next_octet += 1;
        state.next_octet
    }

    /// Seeds a network and returns its identifier.
    pub fn with_network(&mut self, name: &str) -> String {
        let mut inner = self.lock();
        let octet = Self::next_octet(&mut inner.state);
        let network = FakeNetwork {
            uuid: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            subnet: format!("10.{octet}.0.0/24"),
            is_default: false,
        };
        let uuid = network.uuid.clone();
        inner.state.networks.push(network);
        uuid
    }

    /// Seeds a VM with a 20 GB primary disk, 1 vCPU and 1024 MB RAM, and
    /// returns its identifier.
    pub fn with_vm(&mut self, name: &str, network_name: &str, status: &str) -> String {
        let mut inner = self.lock();
        let network_uuid = inner
            .state
            .networks
            .iter()
            .find(|network| network.name == network_name)
            .map(|network| network.uuid.clone())
            .unwrap_or_default();
        let vm = Self::build_vm(&mut inner.state, name, &network_uuid, (1, 1024, 20), status);
        let uuid = vm.uuid.clone();
        inner.state.vms.push(vm);
        uuid
    }

    /// Seeds a floating IP, optionally assigned to a VM, and returns its
    /// address.
    pub fn with_floating_ip(&mut self, name: &str, vm_uuid: Option<&str>) -> String {
        let mut inner = self.lock();
        let mut ip = Self::build_ip(&mut inner.state, name);
        if let Some(uuid) = vm_uuid {
            let private = inner
                .state
                .vms
                .iter()
                .find(|vm| vm.uuid == uuid)
                .map(|vm| vm.private_ipv4.clone());
            ip.assigned_to = Some(uuid.to_owned());
            ip.assigned_to_private_ip = private;
        }
        let address = ip.address.clone();
        inner.state.floating_ips.push(ip);
        address
    }

    /// Seeds an extra disk on a VM and returns its device name.
    pub fn with_disk(&mut self, vm_name: &str, size: u32) -> Option<String> {
        let mut inner = self.lock();
        let vm = inner.state.vms.iter_mut().find(|vm| vm.name == vm_name)?;
        let disk = FakeDisk {
            uuid: Uuid::new_v4().to_string(),
            name: free_disk_name(&vm.storage),
            size,
            primary: false,
        };
        let name = disk.name.clone();
        vm.storage.push(disk);
        Some(name)
    }

    /// Makes listings return every entry regardless of `page`/`limit`.
    pub fn ignore_paging(&self, ignore: bool) {
        self.lock().state.ignore_paging = ignore;
    }

    /// Makes VM and disk resizes fail with 409 unless the VM is stopped.
    pub fn require_stopped_for_resize(&self, required: bool) {
        self.lock().state.require_stopped_for_resize = required;
    }

    /// Fails the next request whose method matches and whose path ends with
    /// `path_suffix`.
    pub fn fail_on(&self, method: Method, path_suffix: &str, status: u16, body: Value) {
        self.lock().failures.push(Failure {
            method,
            path_suffix: path_suffix.to_owned(),
            status,
            body,
        });
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    /// Requests other than `GET` received so far.
    #[must_use]
    pub fn mutations(&self) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method != Method::Get)
            .collect()
    }

    /// Forgets recorded requests.
    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    /// Current status of the named VM.
    #[must_use]
    pub fn vm_status(&self, name: &str) -> Option<String> {
        self.lock()
            .state
            .vms
            .iter()
            .find(|vm| vm.name == name)
            .map(|vm| vm.status.clone())
    }

    /// Identifier of the named VM.
    #[must_use]
    pub fn vm_uuid(&self, name: &str) -> Option<String> {
        self.lock()
            .state
            .vms
            .iter()
            .find(|vm| vm.name == name)
            .map(|vm| vm.uuid.clone())
    }

    /// Names of every VM.
    #[must_use]
    pub fn vm_names(&self) -> Vec<String> {
        self.lock().state.vms.iter().map(|vm| vm.name.clone()).collect()
    }

    /// Names of every network.
    #[must_use]
    pub fn network_names(&self) -> Vec<String> {
        self.lock()
            .state
            .networks
            .iter()
            .map(|network| network.name.clone())
            .collect()
    }

    /// Addresses of every floating IP.
    #[must_use]
    pub fn floating_ip_addresses(&self) -> Vec<String> {
        self.lock()
            .state
            .floating_ips
            .iter()
            .map(|ip| ip.address.clone())
            .collect()
    }

    /// Number of disks detached but not yet deleted.
    #[must_use]
    pub fn detached_disk_count(&self) -> usize {
        self.lock().state.detached_disks.len()
    }

    /// Serialises the provider state.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        to_value(&self.lock().state)
    }

    /// Restores a cloud from [`FakeCloud::snapshot`] output.
    ///
    /// # Errors
    ///
    /// Returns the decoding error when `value` is not a saved state.
    pub fn from_snapshot(value: Value) -> Result<Self, serde_json::Error> {
        let state: CloudState = serde_json::from_value(value)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                ..Inner::default()
            })),
        })
    }

    fn build_vm(
        state: &mut CloudState,
        name: &str,
        network_uuid: &str,
        (vcpu, memory, disks): (u32, u32, u32),
        status: &str,
    ) -> FakeVm {
        let octet = Self::next_octet(state);
        FakeVm {
            uuid: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            hostname: name.to_lowercase(),
            vcpu,
            memory,
            private_ipv4: format!("10.0.0.{octet}"),
            billing_account: 1000,
            status: status.to_owned(),
            network_uuid: network_uuid.to_owned(),
            storage: vec![FakeDisk {
                uuid: Uuid::new_v4().to_string(),
                name: String::from("vda"),
                size: disks,
                primary: true,
            }],
        }
    }

    fn build_ip(state: &mut CloudState, name: &str) -> FakeIp {
        let octet = Self::next_octet(state);
        FakeIp {
            uuid: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            address: format!("103.10.20.{octet}"),
            assigned_to: None,
            assigned_to_private_ip: None,
            enabled: true,
        }
    }

    fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let mut inner = self.lock();
        inner.requests.push(request.clone());

        let failure = inner.failures.iter().position(|pending| {
            pending.method == request.method && request.path.ends_with(&pending.path_suffix)
        });
        if let Some(index) = failure {
            let injected = inner.failures.remove(index);
            return ApiResponse::new(injected.status, injected.body);
        }

        let Some((_, resource)) = request.path.split_once('/') else {
            return error(404, "unknown location");
        };
        let state = &mut inner.state;
        let paging = !state.ignore_paging;
        let segments: Vec<&str> = resource.split('/').collect();
        match (request.method, segments.as_slice()) {
            (Method::Get, ["network", "networks"]) => page(paging, request, &state.networks),
            (Method::Post, ["network", "network"]) => create_network(state, request),
            (Method::Delete, ["network", "network", uuid]) => delete_network(state, uuid),
            (Method::Get, ["user-resource", "vm", "list"]) => page(paging, request, &state.vms),
            (Method::Post, ["user-resource", "vm"]) => create_vm(state, request),
            (Method::Patch, ["user-resource", "vm"]) => resize_vm(state, request),
            (Method::Delete, ["user-resource", "vm"]) => delete_vm(state, request),
            (Method::Post, ["user-resource", "vm", "start"]) => {
                power(state, request, STATUS_RUNNING)
            }
            (Method::Post, ["user-resource", "vm", "stop"]) => {
                power(state, request, STATUS_STOPPED)
            }
            (Method::Post, ["user-resource", "vm", "storage"]) => create_disk(state, request),
            (Method::Patch, ["user-resource", "vm", "storage"]) => resize_disk(state, request),
            (Method::Delete, ["user-resource", "vm", "storage"]) => detach_disk(state, request),
            (Method::Delete, ["storage", "disks", uuid]) => delete_disk(state, uuid),
            (Method::Get, ["network", "ip_addresses"]) => {
                page(paging, request, &state.floating_ips)
            }
            (Method::Post, ["network", "ip_addresses"]) => create_ip(state, request),
            (Method::Post, ["network", "ip_addresses", address, "assign"]) => {
                assign_ip(state, request, address)
            }
            (Method::Post, ["network", "ip_addresses", address, "unassign"]) => {
                unassign_ip(state, address)
            }
            (Method::Delete, ["network", "ip_addresses", address]) => delete_ip(state, address),
            _ => error(404, "no such endpoint"),
        }
    }
}

impl ResourceClient for FakeCloud {
    fn request(&self, request: ApiRequest) -> ClientFuture<'_, ApiResponse> {
        Box::pin(std::future::ready(Ok(self.handle(&request))))
    }
}

fn page<T: Serialize>(paging: bool, request: &ApiRequest, items: &[T]) -> ApiResponse {
    let all: Vec<Value> = items.iter().map(to_value).collect();
    if !paging {
        return ok(Value::Array(all));
    }
    let page_number = request
        .param("page")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);
    let unpaged = all.len().max(1);
    let limit = request
        .param("limit")
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(unpaged)
        .max(1);
    let entries = all
        .into_iter()
        .skip((page_number - 1) * limit)
        .take(limit)
        .collect();
    ok(Value::Array(entries))
}

fn create_network(state: &mut CloudState, request: &ApiRequest) -> ApiResponse {
    let Some(name) = request.param("name") else {
        return error(400, "name is required");
    };
    let octet = FakeCloud::next_octet(state);
    let network = FakeNetwork {
        uuid: Uuid::new_v4().to_string(),
        name: name.to_owned(),
        subnet: format!("10.{octet}.0.0/24"),
        is_default: false,
    };
    let body = to_value(&network);
    state.networks.push(network);
    ok(body)
}

fn delete_network(state: &mut CloudState, uuid: &str) -> ApiResponse {
    if state.vms.iter().any(|vm| vm.network_uuid == uuid) {
        return error(409, "network is in use");
    }
    let before = state.networks.len();
    state.networks.retain(|network| network.uuid != uuid);
    if state.networks.len() == before {
        return error(404, "network not found");
    }
    ok(json!({}))
}

fn find_vm<'s>(state: &'s mut CloudState, request: &ApiRequest) -> Option<&'s mut FakeVm> {
    let uuid = form_value(request, "uuid")?;
    state.vms.iter_mut().find(|vm| vm.uuid == uuid)
}

fn create_vm(state: &mut CloudState, request: &ApiRequest) -> ApiResponse {
    let required = [
        "network_uuid",
        "name",
        "os_name",
        "os_version",
        "disks",
        "vcpu",
        "ram",
        "username",
        "password",
    ];
    if let Some(missing) = required.iter().find(|key| form_value(request, key).is_none()) {
        return error(400, &format!("{missing} is required"));
    }
    let network_uuid = form_value(request, "network_uuid").unwrap_or_default();
    if !state.networks.iter().any(|network| network.uuid == network_uuid) {
        return error(404, "network not found");
    }
    let name = form_value(request, "name").unwrap_or_default();
    let sizing = (
        number(request, "vcpu").unwrap_or(1),
        number(request, "ram").unwrap_or(1024),
        number(request, "disks").unwrap_or(20),
    );
    let vm = FakeCloud::build_vm(state, name, network_uuid, sizing, STATUS_RUNNING);
    let body = to_value(&vm);
    state.vms.push(vm);
    ok(body)
}

fn resize_vm(state: &mut CloudState, request: &ApiRequest) -> ApiResponse {
    let require_stopped = state.require_stopped_for_resize;
    let Some(vm) = find_vm(state, request) else {
        return error(404, "vm not found");
    };
    if require_stopped && vm.status != STATUS_STOPPED {
        return error(409, "VM must be stopped before resizing");
    }
    if let Some(vcpu) = number(request, "vcpu") {
        vm.vcpu = vcpu;
    }
    if let Some(ram) = number(request, "ram") {
        vm.memory = ram;
    }
    ok(to_value(vm))
}

fn delete_vm(state: &mut CloudState, request: &ApiRequest) -> ApiResponse {
    let Some(uuid) = form_value(request, "uuid") else {
        return error(400, "uuid is required");
    };
    let before = state.vms.len();
    state.vms.retain(|vm| vm.uuid != uuid);
    if state.vms.len() == before {
        return error(404, "vm not found");
    }
    for ip in &mut state.floating_ips {
        if ip.assigned_to.as_deref() == Some(uuid) {
            ip.assigned_to = None;
            ip.assigned_to_private_ip = None;
        }
    }
    ok(json!({}))
}

fn power(state: &mut CloudState, request: &ApiRequest, status: &str) -> ApiResponse {
    let Some(vm) = find_vm(state, request) else {
        return error(404, "vm not found");
    };
    status.clone_into(&mut vm.status);
    ok(to_value(vm))
}

fn create_disk(state: &mut CloudState, request: &ApiRequest) -> ApiResponse {
    let Some(size) = number(request, "size_gb") else {
        return error(400, "size_gb is required");
    };
    let Some(vm) = find_vm(state, request) else {
        return error(404, "vm not found");
    };
    let disk = FakeDisk {
        uuid: Uuid::new_v4().to_string(),
        name: free_disk_name(&vm.storage),
        size,
        primary: false,
    };
    let body = json!({ "uuid": disk.uuid, "name": disk.name, "size": disk.size });
    vm.storage.push(disk);
    ok(body)
}

fn resize_disk(state: &mut CloudState, request: &ApiRequest) -> ApiResponse {
    let require_stopped = state.require_stopped_for_resize;
    let disk_uuid = form_value(request, "disk_uuid").unwrap_or_default().to_owned();
    let Some(size) = number(request, "size_gb") else {
        return error(400, "size_gb is required");
    };
    let Some(vm) = find_vm(state, request) else {
        return error(404, "vm not found");
    };
    if require_stopped && vm.status != STATUS_STOPPED {
        return error(409, "VM must be stopped before resizing");
    }
    let Some(disk) = vm.storage.iter_mut().find(|disk| disk.uuid == disk_uuid) else {
        return error(404, "disk not found");
    };
    if size < disk.size {
        return error(400, "disks cannot shrink");
    }
    disk.size = size;
    ok(json!({ "uuid": disk.uuid, "name": disk.name, "size": disk.size }))
}

fn detach_disk(state: &mut CloudState, request: &ApiRequest) -> ApiResponse {
    let storage_uuid = form_value(request, "storage_uuid").unwrap_or_default().to_owned();
    let Some(vm) = find_vm(state, request) else {
        return error(404, "vm not found");
    };
    let Some(index) = vm.storage.iter().position(|disk| disk.uuid == storage_uuid) else {
        return error(404, "disk not attached");
    };
    let disk = vm.storage.remove(index);
    state.detached_disks.push(disk);
    ok(json!({ "success": true }))
}

fn delete_disk(state: &mut CloudState, uuid: &str) -> ApiResponse {
    let before = state.detached_disks.len();
    state.detached_disks.retain(|disk| disk.uuid != uuid);
    if state.detached_disks.len() == before {
        return error(404, "disk not found");
    }
    ApiResponse::new(204, Value::Null)
}

fn create_ip(state: &mut CloudState, request: &ApiRequest) -> ApiResponse {
    let Some(name) = json_value(request, "name") else {
        return error(400, "name is required");
    };
    let ip = FakeCloud::build_ip(state, name);
    let body = to_value(&ip);
    state.floating_ips.push(ip);
    ok(body)
}

fn assign_ip(state: &mut CloudState, request: &ApiRequest, address: &str) -> ApiResponse {
    let Some(vm_uuid) = json_value(request, "vm_uuid") else {
        return error(400, "vm_uuid is required");
    };
    let Some(private) = state
        .vms
        .iter()
        .find(|vm| vm.uuid == vm_uuid)
        .map(|vm| vm.private_ipv4.clone())
    else {
        return error(404, "vm not found");
    };
    let Some(ip) = state.floating_ips.iter_mut().find(|ip| ip.address == address) else {
        return error(404, "address not found");
    };
    if ip.assigned_to.is_some() {
        return error(409, "address already assigned");
    }
    ip.assigned_to = Some(vm_uuid.to_owned());
    ip.assigned_to_private_ip = Some(private);
    ok(to_value(ip))
}

fn unassign_ip(state: &mut CloudState, address: &str) -> ApiResponse {
    let Some(ip) = state.floating_ips.iter_mut().find(|ip| ip.address == address) else {
        return error(404, "address not found");
    };
    ip.assigned_to = None;
    ip.assigned_to_private_ip = None;
    ok(to_value(ip))
}

fn delete_ip(state: &mut CloudState, address: &str) -> ApiResponse {
    let before = state.floating_ips.len();
    state.floating_ips.retain(|ip| ip.address != address);
    if state.floating_ips.len() == before {
        return error(404, "address not found");
    }
    ok(json!({}))
}

/// Serialises tests that touch process environment variables.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Environment overrides held for the lifetime of the guard.
///
/// Each entry either sets (`Some`) or unsets (`None`) a variable. Prior
/// values come back when the guard drops, and [`ENV_LOCK`] stays held until
/// then.
pub struct EnvGuard {
    saved: Vec<(String, Option<OsString>)>,
    _lock: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Applies `overrides` once the lock is acquired.
    pub async fn apply(overrides: &[(&str, Option<&str>)]) -> Self {
        let lock = ENV_LOCK.lock().await;
        let mut saved: Vec<(String, Option<OsString>)> = Vec::with_capacity(overrides.len());
        for (key, value) in overrides {
            if !saved.iter().any(|(seen, _)| seen.as_str() == *key) {
                saved.push(((*key).to_owned(), env::var_os(key)));
            }
            // SAFETY: every writer holds `ENV_LOCK`.
            unsafe {
                match value {
                    Some(raw) => env::set_var(key, raw),
                    None => env::remove_var(key),
                }
            }
        }
        Self { saved, _lock: lock }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..).rev() {
            // SAFETY: `_lock` is still held.
            unsafe {
                match previous {
                    Some(raw) => env::set_var(&key, raw),
                    None => env::remove_var(&key),
                }
            }
        }
    }
}
