//! In-memory daemon double shared by the unit tests.

use crate::client::{ClientError, Connect, ScanService};
use crate::model::{
    ExportFormat, RenderedReport, ReportOptions, ScanEngine, ScanPolicy, TargetSpec, TaskSnapshot,
    TaskStatus,
};
use crate::poll::Clock;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ListEngines,
    ListPolicies,
    CreateTarget(TargetSpec),
    CreateTask {
        name: String,
        engine_id: String,
        target_id: String,
        policy_id: String,
    },
    StartTask(String),
    TaskStatus(String),
    GetReport(String, ExportFormat),
    DeleteTarget(String),
    DeleteTask(String),
    Close,
}

impl Call {
    pub(crate) fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateTarget(_)
                | Call::CreateTask { .. }
                | Call::StartTask(_)
                | Call::DeleteTarget(_)
                | Call::DeleteTask(_)
        )
    }
}

pub(crate) type CallLog = Rc<RefCell<Vec<Call>>>;

#[derive(Debug, Default)]
pub(crate) struct FakeService {
    pub(crate) engines: Vec<ScanEngine>,
    pub(crate) policies: Vec<ScanPolicy>,
    pub(crate) statuses: VecDeque<TaskSnapshot>,
    pub(crate) reports: HashMap<ExportFormat, String>,
    /// Names of operations that fail with a status error.
    pub(crate) failing: HashSet<&'static str>,
    pub(crate) log: CallLog,
}

impl FakeService {
    pub(crate) fn scenario_a() -> Self {
        Self {
            engines: vec![ScanEngine {
                id: "e1".to_string(),
                name: "OpenVAS Default".to_string(),
                host: "h".to_string(),
            }],
            policies: vec![ScanPolicy {
                id: "p1".to_string(),
                name: "Full and fast".to_string(),
            }],
            statuses: VecDeque::from(vec![
                running(0),
                running(100),
                TaskSnapshot::new(TaskStatus::Done, 100, Some("r1".to_string())),
            ]),
            ..Self::default()
        }
    }

    pub(crate) fn with_report(mut self, format: ExportFormat, payload: &[u8]) -> Self {
        use base64::Engine as _;
        let encoded = base64::engine::general_purpose::STANDARD.encode(payload);
        self.reports.insert(format, encoded);
        self
    }

    pub(crate) fn with_empty_report(mut self, format: ExportFormat) -> Self {
        self.reports.insert(format, String::new());
        self
    }

    pub(crate) fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn check(&self, operation: &'static str) -> Result<(), ClientError> {
        if self.failing.contains(operation) {
            return Err(ClientError::Status {
                command: operation.to_string(),
                status: "400".to_string(),
                text: "rejected by test double".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn running(progress: i64) -> TaskSnapshot {
    TaskSnapshot::new(TaskStatus::Running, progress, None)
}

impl ScanService for FakeService {
    fn list_scan_engines(&mut self, _filter: &str) -> Result<Vec<ScanEngine>, ClientError> {
        self.record(Call::ListEngines);
        self.check("list_scan_engines")?;
        Ok(self.engines.clone())
    }

    fn list_scan_policies(&mut self, _filter: &str) -> Result<Vec<ScanPolicy>, ClientError> {
        self.record(Call::ListPolicies);
        self.check("list_scan_policies")?;
        Ok(self.policies.clone())
    }

    fn create_target(&mut self, target: &TargetSpec) -> Result<String, ClientError> {
        self.record(Call::CreateTarget(target.clone()));
        self.check("create_target")?;
        Ok("t1".to_string())
    }

    fn create_task(
        &mut self,
        name: &str,
        engine_id: &str,
        target_id: &str,
        policy_id: &str,
    ) -> Result<String, ClientError> {
        self.record(Call::CreateTask {
            name: name.to_string(),
            engine_id: engine_id.to_string(),
            target_id: target_id.to_string(),
            policy_id: policy_id.to_string(),
        });
        self.check("create_task")?;
        Ok("k1".to_string())
    }

    fn start_task(&mut self, task_id: &str) -> Result<(), ClientError> {
        self.record(Call::StartTask(task_id.to_string()));
        self.check("start_task")
    }

    fn task_status(&mut self, task_id: &str) -> Result<TaskSnapshot, ClientError> {
        self.record(Call::TaskStatus(task_id.to_string()));
        self.check("task_status")?;
        self.statuses
            .pop_front()
            .ok_or_else(|| ClientError::Protocol("status sequence exhausted".to_string()))
    }

    fn get_report(
        &mut self,
        report_id: &str,
        format: ExportFormat,
        _options: &ReportOptions,
    ) -> Result<RenderedReport, ClientError> {
        self.record(Call::GetReport(report_id.to_string(), format));
        self.check("get_report")?;
        Ok(RenderedReport {
            content: self.reports.get(&format).cloned().unwrap_or_default(),
            content_type: None,
        })
    }

    fn delete_target(&mut self, target_id: &str) -> Result<(), ClientError> {
        self.record(Call::DeleteTarget(target_id.to_string()));
        self.check("delete_target")
    }

    fn delete_task(&mut self, task_id: &str) -> Result<(), ClientError> {
        self.record(Call::DeleteTask(task_id.to_string()));
        self.check("delete_task")
    }

    fn close(&mut self) -> Result<(), ClientError> {
        self.record(Call::Close);
        Ok(())
    }
}

/// Hands out a single prepared `FakeService`.
pub(crate) struct FakeConnector {
    service: RefCell<Option<FakeService>>,
    pub(crate) log: CallLog,
    refuse: bool,
}

impl FakeConnector {
    pub(crate) fn new(service: FakeService) -> Self {
        let log = service.log.clone();
        Self {
            service: RefCell::new(Some(service)),
            log,
            refuse: false,
        }
    }

    pub(crate) fn refusing() -> Self {
        Self {
            service: RefCell::new(None),
            log: CallLog::default(),
            refuse: true,
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }
}

impl Connect for FakeConnector {
    type Session = FakeService;

    fn connect(&self) -> Result<FakeService, ClientError> {
        if self.refuse {
            return Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "daemon not running",
            )));
        }
        self.service
            .borrow_mut()
            .take()
            .ok_or_else(|| ClientError::Protocol("connector already used".to_string()))
    }
}

/// Clock that advances only when slept on.
pub(crate) struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
    pub(crate) sleeps: Cell<u32>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
            sleeps: Cell::new(0),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
        self.sleeps.set(self.sleeps.get() + 1);
    }
}
