use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{RecursiveMode, Watcher};
use serde_json::{Value, json};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::Path,
    sync::mpsc::{self, Sender},
    thread,
    time::Duration,
};

use super::pipeline::{Op, PipelineMsg, run_pipeline};
use super::runtime::socket_path;
use crate::actions::LogSink;
use crate::config::{DaemonConfigState, Profile};
use crate::landmarks::Landmark;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path()?;
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut state = DaemonState::new()?;
    info!("daemon: active profile '{}'", state.cfg.active_name);

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();

    // engine thread
    let engine = EngineThread::start(state.cfg.profile.clone());

    // profile edits on disk trigger a reload
    let tx_watch = tx_req.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(ev) if ev.kind.is_modify() || ev.kind.is_create() => {
                let _ = tx_watch.send(IpcMsg::Reload);
            }
            Ok(_) => {}
            Err(e) => warn!("profile watch error: {e}"),
        }
    })?;
    watcher.watch(&state.cfg.profiles_dir, RecursiveMode::NonRecursive)?;

    // SIGINT / SIGTERM
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let tx_sig = tx_req.clone();
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("daemon: received signal {sig}");
            let _ = tx_sig.send(IpcMsg::Shutdown);
        }
    });

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                let tx = tx_req.clone();
                let tx_engine = engine.sender();
                let st_snapshot = state.clone_shallow();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, st_snapshot, tx, tx_engine) {
                        error!("ipc client error: {e}");
                    }
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("accept failed: {e}"),
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => match state.cfg.reload() {
                    Ok(()) => {
                        engine.update_profile(state.cfg.profile.clone());
                        info!("profile reloaded");
                    }
                    Err(e) => error!("reload failed, keeping last good profile: {e}"),
                },
                IpcMsg::UseProfile(name) => {
                    if let Err(e) = state.cfg.set_active(&name) {
                        error!("use profile failed: {e}");
                    } else {
                        engine.update_profile(state.cfg.profile.clone());
                        info!("switched active profile to {}", state.cfg.active_name);
                    }
                }
                IpcMsg::Shutdown => {
                    engine.stop();
                    let _ = std::fs::remove_file(&sock);
                    info!("daemon: shut down");
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

/// Serves one connection. A capture client may keep the socket open and
/// stream one request per line.
fn handle_client(
    stream: UnixStream,
    st: DaemonState,
    tx_req: Sender<IpcMsg>,
    tx_engine: Sender<PipelineMsg>,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let resp = match serde_json::from_str::<Value>(&line) {
            Ok(req) => respond(&req, &st, &tx_req, &tx_engine),
            Err(e) => {
                warn!("malformed request: {e}");
                json!({"ok": false, "error": format!("malformed request: {e}")})
            }
        };
        writeln!(writer, "{resp}")?;
        if resp.get("data").and_then(Value::as_str) == Some("shutting down") {
            break;
        }
    }
    Ok(())
}

fn respond(
    req: &Value,
    st: &DaemonState,
    tx_req: &Sender<IpcMsg>,
    tx_engine: &Sender<PipelineMsg>,
) -> Value {
    let op = req.get("op").and_then(Value::as_str).unwrap_or("");
    let sock = socket_path().unwrap_or_default();

    let engine_op = match op {
        "status" => Some(Op::Status),
        "begin" => Some(Op::Begin),
        "reset" => Some(Op::Reset),
        "layout" => Some(Op::Layout),
        "frame" => match parse_landmarks(req.get("landmarks")) {
            Ok(points) => Some(Op::Frame(points)),
            Err(e) => return json!({"ok": false, "error": e.to_string()}),
        },
        "viewport" => match parse_viewport(req) {
            Some((width, height)) => Some(Op::Viewport { width, height }),
            None => return json!({"ok": false, "error": "viewport needs numeric width and height"}),
        },
        "design" => {
            let dir = req.get("dir").and_then(Value::as_str).unwrap_or("next");
            Some(Op::Design {
                forward: dir != "prev",
            })
        }
        _ => None,
    };
    if let Some(op) = engine_op {
        return engine_request(tx_engine, op);
    }

    match op {
        "reload" => {
            let _ = tx_req.send(IpcMsg::Reload);
            json!({"ok": true, "data": {"active_profile": st.cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(Value::as_str).unwrap_or("");
            if name.is_empty() {
                return json!({"ok": false, "error": "missing profile name"});
            }
            if let Err(e) = st.cfg.check_profile(name) {
                return json!({"ok": false, "error": e.to_string()});
            }
            let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
            json!({"ok": true, "data": {"active_profile": name}})
        }
        "list" => {
            let list = st.cfg.list_profiles();
            json!({"ok": true, "data": {"profiles": list, "active": st.cfg.active_name}})
        }
        "doctor" => json!({"ok": true, "data": st.cfg.doctor_report(&sock)}),
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            json!({"ok": true, "data": "shutting down"})
        }
        _ => json!({"ok": false, "error": format!("unknown op: {op}")}),
    }
}

/// `null` or a missing field means no hand.
fn parse_landmarks(v: Option<&Value>) -> Result<Option<Vec<Landmark>>> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| anyhow!("bad landmarks: {e}")),
    }
}

/// The breakpoint comes from the profile, so only the size is read here.
fn parse_viewport(req: &Value) -> Option<(f32, f32)> {
    let width = req.get("width").and_then(Value::as_f64)?;
    let height = req.get("height").and_then(Value::as_f64)?;
    Some((width as f32, height as f32))
}

fn engine_request(tx: &Sender<PipelineMsg>, op: Op) -> Value {
    let (reply, rx) = mpsc::channel();
    if tx.send(PipelineMsg::Request { op, reply }).is_err() {
        return json!({"ok": false, "error": "engine is not running"});
    }
    rx.recv_timeout(REPLY_TIMEOUT)
        .unwrap_or_else(|e| json!({"ok": false, "error": format!("engine did not answer: {e}")}))
}

struct DaemonState {
    cfg: DaemonConfigState,
}

impl DaemonState {
    fn new() -> Result<Self> {
        let cfg = DaemonConfigState::load_or_install_default()?;
        Ok(Self { cfg })
    }
    fn clone_shallow(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
        }
    }
}

enum IpcMsg {
    Reload,
    UseProfile(String),
    Shutdown,
}

struct EngineThread {
    tx: Sender<PipelineMsg>,
    handle: Option<thread::JoinHandle<()>>,
}

impl EngineThread {
    fn start(profile: Profile) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            if let Err(e) = run_pipeline(profile, rx, Box::new(LogSink)) {
                error!("engine pipeline failed: {e}");
            }
        });
        Self {
            tx,
            handle: Some(handle),
        }
    }

    fn sender(&self) -> Sender<PipelineMsg> {
        self.tx.clone()
    }

    fn update_profile(&self, profile: Profile) {
        let _ = self.tx.send(PipelineMsg::Profile(profile));
    }

    fn stop(mut self) {
        let _ = self.tx.send(PipelineMsg::Shutdown);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

// client helper
pub fn client_request(req: Value) -> Result<Value> {
    let sock = socket_path()?;
    request_at(&sock, &req)
}

fn request_at(sock: &Path, req: &Value) -> Result<Value> {
    if !sock.exists() {
        return Err(anyhow!(
            "arcanum daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: Value = serde_json::from_str(&resp)?;
    Ok(v)
}
