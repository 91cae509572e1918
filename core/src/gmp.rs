//! Greenbone Management Protocol adapter.
//!
//! Commands are single XML documents written to the daemon socket; each
//! answer is one XML document whose root element carries a `status`
//! attribute. A response is complete once its root element closes.

use crate::client::{ClientError, Connect, ScanService};
use crate::config::ConnectionConfig;
use crate::model::{
    ExportFormat, RenderedReport, ReportOptions, ScanEngine, ScanPolicy, TargetSpec, TaskSnapshot,
    TaskStatus,
};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;
use tracing::{debug, info};

const READ_CHUNK: usize = 16 * 1024;

/// Opens and authenticates a socket session per workflow run.
#[derive(Debug, Clone)]
pub struct GmpConnector {
    config: ConnectionConfig,
}

impl GmpConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

impl Connect for GmpConnector {
    type Session = GmpSession<UnixStream>;

    fn connect(&self) -> Result<Self::Session, ClientError> {
        let mut session = GmpSession::connect(&self.config)?;
        session.authenticate(&self.config.username, &self.config.password)?;
        Ok(session)
    }
}

#[derive(Debug)]
pub struct GmpSession<T: Read + Write = UnixStream> {
    transport: Option<T>,
}

impl GmpSession<UnixStream> {
    pub fn connect(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(&config.socket_path)?;
        if let Some(secs) = config.read_timeout_secs {
            stream.set_read_timeout(Some(Duration::from_secs(secs)))?;
        }
        info!(socket = %config.socket_path.display(), "connected to management daemon");
        Ok(Self::new(stream))
    }
}

impl<T: Read + Write> GmpSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    pub fn authenticate(&mut self, username: &str, password: &str) -> Result<(), ClientError> {
        let command = format!(
            "<authenticate><credentials><username>{}</username><password>{}</password></credentials></authenticate>",
            escape(username),
            escape(password)
        );
        self.send("authenticate", &command)?;
        info!(username, "authenticated");
        Ok(())
    }

    fn send(&mut self, command: &str, request: &str) -> Result<Vec<u8>, ClientError> {
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| ClientError::Protocol(format!("{command} sent on a closed session")))?;
        transport.write_all(request.as_bytes())?;
        transport.flush()?;

        let mut response = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let read = transport.read(&mut chunk)?;
            if read == 0 {
                return Err(ClientError::Protocol(format!(
                    "connection closed before the {command} response completed"
                )));
            }
            response.extend_from_slice(&chunk[..read]);
            if ends_with_tag(&response) && response_complete(&response) {
                break;
            }
        }
        debug!(command, bytes = response.len(), "received response");

        check_status(command, &response)?;
        Ok(response)
    }
}

impl<T: Read + Write> ScanService for GmpSession<T> {
    fn list_scan_engines(&mut self, filter: &str) -> Result<Vec<ScanEngine>, ClientError> {
        let request = format!("<get_scanners filter=\"{}\"/>", escape(filter));
        let response = self.send("get_scanners", &request)?;
        parse_scanners(&response)
    }

    fn list_scan_policies(&mut self, filter: &str) -> Result<Vec<ScanPolicy>, ClientError> {
        let request = format!(
            "<get_configs usage_type=\"scan\" filter=\"{}\"/>",
            escape(filter)
        );
        let response = self.send("get_configs", &request)?;
        parse_configs(&response)
    }

    fn create_target(&mut self, target: &TargetSpec) -> Result<String, ClientError> {
        let request = format!(
            "<create_target><name>{}</name><hosts>{}</hosts><port_range>{}</port_range></create_target>",
            escape(&target.name),
            escape(&target.hosts.join(",")),
            escape(&target.port_range)
        );
        let response = self.send("create_target", &request)?;
        parse_created_id("create_target", &response)
    }

    fn create_task(
        &mut self,
        name: &str,
        engine_id: &str,
        target_id: &str,
        policy_id: &str,
    ) -> Result<String, ClientError> {
        let request = format!(
            "<create_task><name>{}</name><usage_type>scan</usage_type><config id=\"{}\"/><target id=\"{}\"/><scanner id=\"{}\"/></create_task>",
            escape(name),
            escape(policy_id),
            escape(target_id),
            escape(engine_id)
        );
        let response = self.send("create_task", &request)?;
        parse_created_id("create_task", &response)
    }

    fn start_task(&mut self, task_id: &str) -> Result<(), ClientError> {
        let request = format!("<start_task task_id=\"{}\"/>", escape(task_id));
        self.send("start_task", &request)?;
        Ok(())
    }

    fn task_status(&mut self, task_id: &str) -> Result<TaskSnapshot, ClientError> {
        let request = format!(
            "<get_tasks task_id=\"{}\" usage_type=\"scan\"/>",
            escape(task_id)
        );
        let response = self.send("get_tasks", &request)?;
        parse_task(&response)
    }

    fn get_report(
        &mut self,
        report_id: &str,
        format: ExportFormat,
        options: &ReportOptions,
    ) -> Result<RenderedReport, ClientError> {
        let request = format!(
            "<get_reports report_id=\"{}\" format_id=\"{}\" ignore_pagination=\"{}\" details=\"{}\"/>",
            escape(report_id),
            format.renderer_id(),
            u8::from(options.ignore_pagination),
            u8::from(options.details)
        );
        let response = self.send("get_reports", &request)?;
        parse_report(&response)
    }

    fn delete_target(&mut self, target_id: &str) -> Result<(), ClientError> {
        let request = format!(
            "<delete_target target_id=\"{}\" ultimate=\"1\"/>",
            escape(target_id)
        );
        self.send("delete_target", &request)?;
        Ok(())
    }

    fn delete_task(&mut self, task_id: &str) -> Result<(), ClientError> {
        let request = format!(
            "<delete_task task_id=\"{}\" ultimate=\"1\"/>",
            escape(task_id)
        );
        self.send("delete_task", &request)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ClientError> {
        if let Some(mut transport) = self.transport.take() {
            transport.flush()?;
            debug!("session closed");
        }
        Ok(())
    }
}

impl<T: Read + Write> Drop for GmpSession<T> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!(error = %err, "failed to close session on drop");
        }
    }
}

enum Node<'a> {
    Open {
        path: &'a [String],
        attrs: &'a BTreeMap<String, String>,
    },
    Text {
        path: &'a [String],
        text: &'a str,
    },
    Close {
        path: &'a [String],
    },
}

fn xml_error(command: &str, err: impl std::fmt::Display) -> ClientError {
    ClientError::Xml {
        command: command.to_string(),
        message: err.to_string(),
    }
}

fn attributes(element: &BytesStart<'_>) -> BTreeMap<String, String> {
    element
        .attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map(|value| value.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
            (key, value)
        })
        .collect()
}

/// Streams the document, handing each node to `visit` together with the
/// names of its enclosing elements (itself included for open/close).
fn walk<F>(command: &str, xml: &[u8], mut visit: F) -> Result<(), ClientError>
where
    F: FnMut(Node<'_>),
{
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(element)) => {
                path.push(String::from_utf8_lossy(element.name().as_ref()).to_string());
                let attrs = attributes(&element);
                visit(Node::Open {
                    path: &path,
                    attrs: &attrs,
                });
            }
            Ok(Event::Empty(element)) => {
                path.push(String::from_utf8_lossy(element.name().as_ref()).to_string());
                let attrs = attributes(&element);
                visit(Node::Open {
                    path: &path,
                    attrs: &attrs,
                });
                visit(Node::Close { path: &path });
                path.pop();
            }
            Ok(Event::End(_)) => {
                visit(Node::Close { path: &path });
                path.pop();
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|err| xml_error(command, err))?;
                visit(Node::Text {
                    path: &path,
                    text: text.as_ref(),
                });
            }
            Ok(Event::CData(data)) => {
                let text = String::from_utf8_lossy(&data.into_inner()).to_string();
                visit(Node::Text {
                    path: &path,
                    text: &text,
                });
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(command, err)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn matches_path(path: &[String], expected: &[&str]) -> bool {
    // The root element name varies per command; compare what follows it.
    path.len() == expected.len() + 1
        && path[1..]
            .iter()
            .zip(expected)
            .all(|(actual, wanted)| actual == wanted)
}

/// A document can only be complete once its last non-blank byte closes a tag.
fn ends_with_tag(xml: &[u8]) -> bool {
    xml.iter().rev().find(|b| !b.is_ascii_whitespace()) == Some(&b'>')
}

/// True once the root element of a (possibly partial) document has closed.
pub(crate) fn response_complete(xml: &[u8]) -> bool {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return true;
                }
            }
            Ok(Event::Empty(_)) if depth == 0 => return true,
            Ok(Event::Eof) | Err(_) => return false,
            _ => {}
        }
        buf.clear();
    }
}

pub(crate) fn check_status(command: &str, xml: &[u8]) -> Result<(), ClientError> {
    let mut root: Option<BTreeMap<String, String>> = None;
    walk(command, xml, |node| {
        if let Node::Open { path, attrs } = node {
            if path.len() == 1 && root.is_none() {
                root = Some(attrs.clone());
            }
        }
    })?;

    let attrs = root.ok_or(ClientError::MissingField {
        command: command.to_string(),
        field: "root element",
    })?;
    let status = attrs.get("status").cloned().unwrap_or_default();
    if status.starts_with('2') {
        return Ok(());
    }
    Err(ClientError::Status {
        command: command.to_string(),
        status,
        text: attrs.get("status_text").cloned().unwrap_or_default(),
    })
}

pub(crate) fn parse_created_id(command: &str, xml: &[u8]) -> Result<String, ClientError> {
    let mut id = None;
    walk(command, xml, |node| {
        if let Node::Open { path, attrs } = node {
            if path.len() == 1 {
                id = attrs.get("id").cloned();
            }
        }
    })?;
    id.filter(|value| !value.is_empty())
        .ok_or(ClientError::MissingField {
            command: command.to_string(),
            field: "id",
        })
}

#[derive(Default)]
struct ResourceBuilder {
    id: String,
    name: String,
    host: String,
}

fn parse_resources(
    command: &str,
    element: &str,
    xml: &[u8],
) -> Result<Vec<ResourceBuilder>, ClientError> {
    let mut items = Vec::new();
    let mut current: Option<ResourceBuilder> = None;

    walk(command, xml, |node| match node {
        Node::Open { path, attrs } if matches_path(path, &[element]) => {
            current = Some(ResourceBuilder {
                id: attrs.get("id").cloned().unwrap_or_default(),
                ..ResourceBuilder::default()
            });
        }
        Node::Text { path, text } => {
            if let Some(item) = current.as_mut() {
                if matches_path(path, &[element, "name"]) {
                    item.name.push_str(text);
                } else if matches_path(path, &[element, "host"]) {
                    item.host.push_str(text);
                }
            }
        }
        Node::Close { path } if matches_path(path, &[element]) => {
            if let Some(item) = current.take() {
                items.push(item);
            }
        }
        _ => {}
    })?;

    Ok(items)
}

pub(crate) fn parse_scanners(xml: &[u8]) -> Result<Vec<ScanEngine>, ClientError> {
    Ok(parse_resources("get_scanners", "scanner", xml)?
        .into_iter()
        .map(|item| ScanEngine {
            id: item.id,
            name: item.name,
            host: item.host,
        })
        .collect())
}

pub(crate) fn parse_configs(xml: &[u8]) -> Result<Vec<ScanPolicy>, ClientError> {
    Ok(parse_resources("get_configs", "config", xml)?
        .into_iter()
        .map(|item| ScanPolicy {
            id: item.id,
            name: item.name,
        })
        .collect())
}

pub(crate) fn parse_task(xml: &[u8]) -> Result<TaskSnapshot, ClientError> {
    let mut status: Option<String> = None;
    let mut progress: Option<String> = None;
    let mut last_report_id: Option<String> = None;

    walk("get_tasks", xml, |node| match node {
        Node::Text { path, text } if matches_path(path, &["task", "status"]) => {
            status.get_or_insert_with(String::new).push_str(text);
        }
        Node::Text { path, text } if matches_path(path, &["task", "progress"]) => {
            progress.get_or_insert_with(String::new).push_str(text);
        }
        Node::Open { path, attrs } if matches_path(path, &["task", "last_report", "report"]) => {
            last_report_id = attrs.get("id").cloned().filter(|id| !id.is_empty());
        }
        _ => {}
    })?;

    let status = status.ok_or(ClientError::MissingField {
        command: "get_tasks".to_string(),
        field: "task/status",
    })?;
    let progress = progress
        .as_deref()
        .map(str::trim)
        .unwrap_or("0")
        .parse::<i64>()
        .map_err(|err| ClientError::Protocol(format!("invalid task progress: {err}")))?;

    Ok(TaskSnapshot::new(
        TaskStatus::from_gmp(&status),
        progress,
        last_report_id,
    ))
}

pub(crate) fn parse_report(xml: &[u8]) -> Result<RenderedReport, ClientError> {
    let mut report = RenderedReport::default();
    let mut seen = false;

    walk("get_reports", xml, |node| match node {
        Node::Open { path, attrs } if matches_path(path, &["report"]) => {
            seen = true;
            report.content_type = attrs.get("content_type").cloned();
        }
        Node::Text { path, text } if matches_path(path, &["report"]) => {
            report.content.push_str(text);
        }
        _ => {}
    })?;

    if !seen {
        return Err(ClientError::MissingField {
            command: "get_reports".to_string(),
            field: "report",
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::rc::Rc;

    /// Replays canned responses, each split into small reads.
    struct ScriptedTransport {
        responses: VecDeque<Vec<u8>>,
        current: Cursor<Vec<u8>>,
        written: Rc<RefCell<Vec<u8>>>,
        flushes: Rc<Cell<u32>>,
    }

    impl ScriptedTransport {
        fn new(responses: &[&str]) -> (Self, Rc<RefCell<Vec<u8>>>) {
            let written = Rc::new(RefCell::new(Vec::new()));
            let transport = Self {
                responses: responses.iter().map(|r| r.as_bytes().to_vec()).collect(),
                current: Cursor::new(Vec::new()),
                written: written.clone(),
                flushes: Rc::new(Cell::new(0)),
            };
            (transport, written)
        }
    }

    impl Read for ScriptedTransport {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.current.position() as usize >= self.current.get_ref().len() {
                match self.responses.pop_front() {
                    Some(next) => self.current = Cursor::new(next),
                    None => return Ok(0),
                }
            }
            let limit = buf.len().min(7);
            self.current.read(&mut buf[..limit])
        }
    }

    impl Write for ScriptedTransport {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes.set(self.flushes.get() + 1);
            Ok(())
        }
    }

    const SCANNERS: &str = r#"<get_scanners_response status="200" status_text="OK">
  <scanner id="08b69003-5fc2-4037-a479-93b440211c73">
    <owner><name></name></owner>
    <name>OpenVAS Default</name>
    <host>/run/ospd/ospd.sock</host>
    <port>0</port>
  </scanner>
  <scanner id="6acd0832-df90-11e4-b9d5-28d24461215b">
    <name>CVE</name>
    <host></host>
  </scanner>
  <filters id=""><term>rows=-1</term></filters>
</get_scanners_response>"#;

    const TASK_RUNNING: &str = r#"<get_tasks_response status="200" status_text="OK">
  <task id="k1">
    <name>weekly</name>
    <owner><name>admin</name></owner>
    <status>Running</status>
    <progress>42</progress>
    <current_report><report id="r-current"/></current_report>
  </task>
</get_tasks_response>"#;

    const TASK_DONE: &str = r#"<get_tasks_response status="200" status_text="OK">
  <task id="k1">
    <status>Done</status>
    <progress>-1</progress>
    <last_report>
      <report id="r1"><timestamp>2024-01-01T00:00:00Z</timestamp></report>
    </last_report>
  </task>
</get_tasks_response>"#;

    #[test]
    fn parses_scanner_enumeration() {
        let engines = parse_scanners(SCANNERS.as_bytes()).expect("valid response");
        assert_eq!(engines.len(), 2);
        assert_eq!(engines[0].id, "08b69003-5fc2-4037-a479-93b440211c73");
        assert_eq!(engines[0].name, "OpenVAS Default");
        assert_eq!(engines[0].host, "/run/ospd/ospd.sock");
        assert_eq!(engines[1].name, "CVE");
        assert_eq!(engines[1].host, "");
    }

    #[test]
    fn parses_config_enumeration() {
        let xml = r#"<get_configs_response status="200" status_text="OK">
  <config id="daba56c8-73ec-11df-a475-002264764cea"><name>Full and fast</name><family_count>1</family_count></config>
  <config id="085569ce-73ed-11df-83c3-002264764cea"><name>empty</name></config>
</get_configs_response>"#;
        let policies = parse_configs(xml.as_bytes()).expect("valid response");
        assert_eq!(
            policies,
            vec![
                ScanPolicy {
                    id: "daba56c8-73ec-11df-a475-002264764cea".to_string(),
                    name: "Full and fast".to_string(),
                },
                ScanPolicy {
                    id: "085569ce-73ed-11df-83c3-002264764cea".to_string(),
                    name: "empty".to_string(),
                },
            ]
        );
    }

    #[test]
    fn running_task_has_no_last_report() {
        let snapshot = parse_task(TASK_RUNNING.as_bytes()).expect("valid response");
        assert_eq!(snapshot.status, TaskStatus::Running);
        assert_eq!(snapshot.progress, 42);
        assert_eq!(snapshot.last_report_id, None);
    }

    #[test]
    fn done_task_exposes_last_report() {
        let snapshot = parse_task(TASK_DONE.as_bytes()).expect("valid response");
        assert_eq!(snapshot.status, TaskStatus::Done);
        assert_eq!(snapshot.progress, 0);
        assert_eq!(snapshot.last_report_id.as_deref(), Some("r1"));
    }

    #[test]
    fn report_content_is_the_text_after_report_format() {
        let xml = r#"<get_reports_response status="200" status_text="OK"><report id="r1" format_id="c402cc3e-b531-11e1-9163-406186ea4fc5" extension="pdf" content_type="application/pdf"><owner><name>admin</name></owner><name>2024</name><report_format id="c402cc3e-b531-11e1-9163-406186ea4fc5"><name>PDF</name></report_format>JVBERi0x
LjQ=</report><filters id=""/></get_reports_response>"#;
        let report = parse_report(xml.as_bytes()).expect("valid response");
        assert_eq!(report.content, "JVBERi0x\nLjQ=");
        assert_eq!(report.content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn report_without_content_is_empty() {
        let xml = r#"<get_reports_response status="200" status_text="OK"><report id="r1"><report_format id="x"><name>CSV</name></report_format></report></get_reports_response>"#;
        let report = parse_report(xml.as_bytes()).expect("valid response");
        assert!(report.is_empty());
    }

    #[test]
    fn non_2xx_status_is_an_error() {
        let xml = r#"<create_target_response status="400" status_text="Target exists already"/>"#;
        match check_status("create_target", xml.as_bytes()) {
            Err(ClientError::Status { status, text, .. }) => {
                assert_eq!(status, "400");
                assert_eq!(text, "Target exists already");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn created_id_comes_from_root() {
        let xml = r#"<create_task_response status="201" status_text="OK, resource created" id="k1"/>"#;
        assert_eq!(parse_created_id("create_task", xml.as_bytes()).expect("id"), "k1");

        let missing = r#"<create_task_response status="201" status_text="OK"/>"#;
        assert!(matches!(
            parse_created_id("create_task", missing.as_bytes()),
            Err(ClientError::MissingField { field: "id", .. })
        ));
    }

    #[test]
    fn completeness_tracks_root_element() {
        assert!(!response_complete(b""));
        assert!(!response_complete(b"<get_tasks_response status=\"200\"><task"));
        assert!(!response_complete(b"<get_tasks_response status=\"200\"><task/>"));
        assert!(response_complete(b"<get_tasks_response status=\"200\"><task/></get_tasks_response>"));
        assert!(response_complete(b"<start_task_response status=\"202\"/>"));
    }

    #[test]
    fn session_round_trips_over_chunked_transport() {
        let (transport, written) = ScriptedTransport::new(&[
            r#"<authenticate_response status="200" status_text="OK"><role>Admin</role></authenticate_response>"#,
            SCANNERS,
            r#"<create_target_response status="201" status_text="OK, resource created" id="t1"/>"#,
        ]);
        let mut session = GmpSession::new(transport);

        session.authenticate("admin", "p<w>d").expect("authenticated");
        let engines = session.list_scan_engines("rows=-1").expect("engines");
        assert_eq!(engines.len(), 2);
        let target = TargetSpec::new("T", "10.0.0.1", "80");
        assert_eq!(session.create_target(&target).expect("target"), "t1");

        let sent = String::from_utf8(written.borrow().clone()).expect("utf8");
        assert!(sent.contains("<password>p&lt;w&gt;d</password>"));
        assert!(sent.contains(r#"<get_scanners filter="rows=-1"/>"#));
        assert!(sent.contains("<hosts>10.0.0.1</hosts><port_range>80</port_range>"));
    }

    #[test]
    fn closed_session_rejects_commands() {
        let (transport, _) = ScriptedTransport::new(&[]);
        let mut session = GmpSession::new(transport);
        session.close().expect("close");
        assert!(!session.is_open());
        assert!(matches!(
            session.start_task("k1"),
            Err(ClientError::Protocol(_))
        ));
        session.close().expect("second close is harmless");
    }

    #[test]
    fn early_eof_is_a_protocol_error() {
        let (transport, _) = ScriptedTransport::new(&["<get_tasks_response status=\"200\">"]);
        let mut session = GmpSession::new(transport);
        assert!(matches!(
            session.task_status("k1"),
            Err(ClientError::Protocol(_))
        ));
    }

    #[test]
    fn dropping_an_open_session_closes_it() {
        let (transport, _) = ScriptedTransport::new(&[]);
        let flushes = transport.flushes.clone();
        let session = GmpSession::new(transport);
        drop(session);
        assert_eq!(flushes.get(), 1);
    }

    #[test]
    fn explicit_close_is_not_repeated_on_drop() {
        let (transport, _) = ScriptedTransport::new(&[]);
        let flushes = transport.flushes.clone();
        let mut session = GmpSession::new(transport);
        session.close().expect("close");
        drop(session);
        assert_eq!(flushes.get(), 1);
    }

    #[test]
    fn completeness_is_only_checked_after_a_tag() {
        assert!(!ends_with_tag(b""));
        assert!(!ends_with_tag(b"<get_reports_response status=\"200\"><report>JVBERi0x"));
        assert!(ends_with_tag(b"<start_task_response status=\"202\"/>\n"));
        assert!(ends_with_tag(b"<a><b></b>"));
    }

    #[test]
    fn large_report_is_read_in_full() {
        let payload = "QUJD".repeat(64 * 1024);
        let response = format!(
            r#"<get_reports_response status="200" status_text="OK"><report id="r1"><report_format id="x"><name>PDF</name></report_format>{payload}</report></get_reports_response>"#
        );
        let (transport, _) = ScriptedTransport::new(&[response.as_str()]);
        let mut session = GmpSession::new(transport);
        let report = session
            .get_report("r1", ExportFormat::Pdf, &ReportOptions::default())
            .expect("report");
        assert_eq!(report.content.len(), payload.len());
    }
}
