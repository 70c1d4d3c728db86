//! In-memory guest used by the behavioral tests.
//!
//! `FakeGuest` plays both the management endpoint and the transfer HTTP
//! server. Programs "run" instantly: their redirect targets are written at
//! start, and exit status is revealed through a scripted poll sequence.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use guestrun_core::{
    CoreError, GuestFileTransfer, HttpTransfer, ProcessRunner, RunnerConfig, Session,
    TransferResponse,
};
use guestrun_vim::{
    kinds, FileAttributes, FileTransferInformation, GuestAuth, GuestOperationsManager,
    GuestProcessInfo, ManagedObjectRef, ObjectContent, ProgramSpec, PropertyFilterSpec,
    ServiceContent, VimError, VimService,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;

pub const CLEANUP_PROGRAM: &str = "/usr/bin/rm";

/// Install a test subscriber once; respects `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn service_content() -> ServiceContent {
    ServiceContent {
        root_folder: ManagedObjectRef::new(kinds::FOLDER, "group-d1"),
        property_collector: ManagedObjectRef::new(kinds::PROPERTY_COLLECTOR, "propertyCollector"),
        view_manager: ManagedObjectRef::new(kinds::VIEW_MANAGER, "ViewManager"),
        guest_operations: Some(GuestOperationsManager {
            process_manager: ManagedObjectRef::new(kinds::GUEST_PROCESS_MANAGER, "processManager"),
            file_manager: ManagedObjectRef::new(kinds::GUEST_FILE_MANAGER, "fileManager"),
        }),
    }
}

pub fn vm() -> ManagedObjectRef {
    ManagedObjectRef::virtual_machine("vm-42")
}

pub fn auth() -> GuestAuth {
    GuestAuth::new("root", "vmware")
}

/// Scripted answer to one process status poll.
#[derive(Debug, Clone)]
pub enum Poll {
    Running,
    Exited(i32),
    Fail(VimError),
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    RetrieveServiceContent,
    CreateView(Vec<String>),
    DestroyView,
    RetrieveContents,
    StartProgram(ProgramSpec),
    ListProcesses(Vec<i64>),
    TransferToGuest { path: String, size: u64, overwrite: bool },
    TransferFromGuest(String),
    Put(String),
    Get(String),
}

struct Ticket {
    path: String,
    upload: bool,
    used: bool,
}

pub struct State {
    pub calls: Vec<Call>,
    pub poll_times: Vec<Instant>,
    pub polls: VecDeque<Poll>,
    /// Answer once `polls` is drained.
    pub default_poll: Poll,
    pub stdout: String,
    pub stderr: String,
    /// Whether started programs create their redirect targets.
    pub writes_output: bool,
    pub start_error: Option<VimError>,
    pub cleanup_error: Option<VimError>,
    pub files: HashMap<String, Bytes>,
    pub put_status: Option<u16>,
    pub get_status: Option<u16>,
    /// Number of GETs that fail at transport level before succeeding.
    pub get_failures: u32,
    pub inventory: Vec<ObjectContent>,
    pub filter_specs: Vec<PropertyFilterSpec>,
    pub retrieve_error: Option<VimError>,
    next_pid: i64,
    tickets: HashMap<u64, Ticket>,
    next_ticket: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            poll_times: Vec::new(),
            polls: VecDeque::new(),
            default_poll: Poll::Exited(0),
            stdout: String::new(),
            stderr: String::new(),
            writes_output: true,
            start_error: None,
            cleanup_error: None,
            files: HashMap::new(),
            put_status: None,
            get_status: None,
            get_failures: 0,
            inventory: Vec::new(),
            filter_specs: Vec::new(),
            retrieve_error: None,
            next_pid: 4000,
            tickets: HashMap::new(),
            next_ticket: 1,
        }
    }
}

#[derive(Default)]
pub struct FakeGuest {
    state: Mutex<State>,
}

impl FakeGuest {
    pub fn new() -> Arc<Self> {
        init_tracing();
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn script_polls(&self, polls: impl IntoIterator<Item = Poll>) {
        self.state().polls.extend(polls);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn started_programs(&self) -> Vec<ProgramSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::StartProgram(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn poll_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::ListProcesses(_)))
            .count()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn ticket_url(state: &mut State, path: &str, upload: bool) -> String {
        let id = state.next_ticket;
        state.next_ticket += 1;
        state.tickets.insert(
            id,
            Ticket {
                path: path.to_string(),
                upload,
                used: false,
            },
        );
        format!("https://*:443/guestFile?id={id}&token=t{id}")
    }

    /// Redeem a ticket URL, enforcing single use.
    fn redeem(state: &mut State, url: &str, upload: bool) -> Option<String> {
        let id: u64 = url
            .split("id=")
            .nth(1)?
            .split('&')
            .next()?
            .parse()
            .ok()?;
        let ticket = state.tickets.get_mut(&id)?;
        if ticket.used || ticket.upload != upload {
            return None;
        }
        ticket.used = true;
        Some(ticket.path.clone())
    }
}

fn redirect_targets(arguments: &str) -> (Option<String>, Option<String>) {
    let tokens: Vec<&str> = arguments.split_whitespace().collect();
    let after = |marker: &str| {
        tokens
            .iter()
            .position(|t| *t == marker)
            .and_then(|i| tokens.get(i + 1))
            .map(|s| s.to_string())
    };
    (after(">"), after("2>"))
}

#[async_trait]
impl VimService for FakeGuest {
    async fn retrieve_service_content(&self) -> guestrun_vim::Result<ServiceContent> {
        self.state().calls.push(Call::RetrieveServiceContent);
        Ok(service_content())
    }

    async fn create_container_view(
        &self,
        _view_manager: &ManagedObjectRef,
        _container: &ManagedObjectRef,
        types: &[String],
        recursive: bool,
    ) -> guestrun_vim::Result<ManagedObjectRef> {
        assert!(recursive, "inventory views are recursive");
        self.state().calls.push(Call::CreateView(types.to_vec()));
        Ok(ManagedObjectRef::new(kinds::CONTAINER_VIEW, "session[1]view-1"))
    }

    async fn destroy_view(&self, _view: &ManagedObjectRef) -> guestrun_vim::Result<()> {
        self.state().calls.push(Call::DestroyView);
        Ok(())
    }

    async fn retrieve_contents(
        &self,
        _collector: &ManagedObjectRef,
        specs: &[PropertyFilterSpec],
    ) -> guestrun_vim::Result<Vec<ObjectContent>> {
        let mut state = self.state();
        state.calls.push(Call::RetrieveContents);
        state.filter_specs.extend(specs.iter().cloned());
        if let Some(e) = state.retrieve_error.clone() {
            return Err(e);
        }

        let spec = &specs[0];
        let prop = &spec.prop_set[0];
        let start = &spec.object_set[0].obj;
        let selected = state.inventory.iter().filter(|content| {
            start.is_kind(kinds::CONTAINER_VIEW) || content.obj == *start
        });

        Ok(selected
            .map(|content| {
                let mut content = content.clone();
                if !prop.all {
                    content.prop_set.retain(|p| prop.path_set.contains(&p.name));
                }
                content
            })
            .collect())
    }

    async fn start_program_in_guest(
        &self,
        _process_manager: &ManagedObjectRef,
        _vm: &ManagedObjectRef,
        _auth: &GuestAuth,
        spec: &ProgramSpec,
    ) -> guestrun_vim::Result<i64> {
        let mut state = self.state();
        state.calls.push(Call::StartProgram(spec.clone()));

        if spec.program_path == CLEANUP_PROGRAM {
            if let Some(e) = state.cleanup_error.clone() {
                return Err(e);
            }
            let prefix = spec
                .arguments
                .trim_start_matches("-rf ")
                .trim_end_matches('*')
                .to_string();
            state.files.retain(|path, _| !path.starts_with(&prefix));
        } else {
            if let Some(e) = state.start_error.clone() {
                return Err(e);
            }
            let (out, err) = if state.writes_output {
                redirect_targets(&spec.arguments)
            } else {
                (None, None)
            };
            if let Some(path) = out {
                let body = Bytes::from(state.stdout.clone());
                state.files.insert(path, body);
            }
            if let Some(path) = err {
                let body = Bytes::from(state.stderr.clone());
                state.files.insert(path, body);
            }
        }

        state.next_pid += 1;
        Ok(state.next_pid)
    }

    async fn list_processes_in_guest(
        &self,
        _process_manager: &ManagedObjectRef,
        _vm: &ManagedObjectRef,
        _auth: &GuestAuth,
        pids: &[i64],
    ) -> guestrun_vim::Result<Vec<GuestProcessInfo>> {
        let mut state = self.state();
        state.calls.push(Call::ListProcesses(pids.to_vec()));
        state.poll_times.push(Instant::now());

        let poll = state
            .polls
            .pop_front()
            .unwrap_or_else(|| state.default_poll.clone());
        let pid = pids[0];
        let info = |exit_code| {
            vec![GuestProcessInfo {
                pid,
                name: "sh".into(),
                owner: "root".into(),
                cmd_line: String::new(),
                exit_code,
            }]
        };

        match poll {
            Poll::Running => Ok(info(None)),
            Poll::Exited(code) => Ok(info(Some(code))),
            Poll::Fail(e) => Err(e),
            Poll::Missing => Ok(Vec::new()),
        }
    }

    async fn initiate_file_transfer_to_guest(
        &self,
        _file_manager: &ManagedObjectRef,
        _vm: &ManagedObjectRef,
        _auth: &GuestAuth,
        guest_file_path: &str,
        _attributes: &FileAttributes,
        file_size: u64,
        overwrite: bool,
    ) -> guestrun_vim::Result<String> {
        let mut state = self.state();
        state.calls.push(Call::TransferToGuest {
            path: guest_file_path.to_string(),
            size: file_size,
            overwrite,
        });
        if !overwrite && state.files.contains_key(guest_file_path) {
            return Err(VimError::fault("FileAlreadyExists", guest_file_path));
        }
        Ok(Self::ticket_url(&mut state, guest_file_path, true))
    }

    async fn initiate_file_transfer_from_guest(
        &self,
        _file_manager: &ManagedObjectRef,
        _vm: &ManagedObjectRef,
        _auth: &GuestAuth,
        guest_file_path: &str,
    ) -> guestrun_vim::Result<FileTransferInformation> {
        let mut state = self.state();
        state
            .calls
            .push(Call::TransferFromGuest(guest_file_path.to_string()));
        let size = match state.files.get(guest_file_path) {
            Some(body) => body.len() as u64,
            None => return Err(VimError::fault("FileNotFound", guest_file_path)),
        };
        Ok(FileTransferInformation {
            url: Self::ticket_url(&mut state, guest_file_path, false),
            size,
            attributes: FileAttributes::default(),
        })
    }
}

#[async_trait]
impl HttpTransfer for FakeGuest {
    async fn put(&self, url: &str, body: Bytes) -> guestrun_core::Result<TransferResponse> {
        let mut state = self.state();
        state.calls.push(Call::Put(url.to_string()));
        if let Some(status) = state.put_status {
            return Ok(TransferResponse::new(status, Bytes::new()));
        }
        match Self::redeem(&mut state, url, true) {
            Some(path) => {
                state.files.insert(path, body);
                Ok(TransferResponse::new(200, Bytes::new()))
            }
            None => Ok(TransferResponse::new(404, Bytes::new())),
        }
    }

    async fn get(&self, url: &str) -> guestrun_core::Result<TransferResponse> {
        let mut state = self.state();
        state.calls.push(Call::Get(url.to_string()));
        if state.get_failures > 0 {
            state.get_failures -= 1;
            return Err(CoreError::Transfer("connection reset by peer".into()));
        }
        if let Some(status) = state.get_status {
            return Ok(TransferResponse::new(status, "server error"));
        }
        match Self::redeem(&mut state, url, false) {
            Some(path) => {
                let body = state.files.get(&path).cloned().unwrap_or_default();
                Ok(TransferResponse::new(200, body))
            }
            None => Ok(TransferResponse::new(404, Bytes::new())),
        }
    }
}

pub fn session(fake: &Arc<FakeGuest>) -> Session {
    let service: Arc<dyn VimService> = fake.clone();
    Session::with_content(service, service_content())
}

pub fn transfer(fake: &Arc<FakeGuest>) -> GuestFileTransfer {
    let http: Arc<dyn HttpTransfer> = fake.clone();
    GuestFileTransfer::new(session(fake), http)
}

pub fn runner(fake: &Arc<FakeGuest>, config: RunnerConfig) -> ProcessRunner {
    ProcessRunner::new(transfer(fake), config)
}
