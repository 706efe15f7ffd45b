use anyhow::Result;
use log::{info, warn};
use serde_json::{Value, json};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::actions::{IntentSink, dispatch_intents};
use crate::config::Profile;
use crate::landmarks::{Landmark, LandmarkFrame};
use crate::session::Session;

/// How often the lock deadline is checked when no request arrives.
const LOCK_POLL: Duration = Duration::from_millis(100);

pub enum Op {
    Status,
    Begin,
    Reset,
    Frame(Option<Vec<Landmark>>),
    Viewport { width: f32, height: f32 },
    Layout,
    Design { forward: bool },
}

pub enum PipelineMsg {
    Request { op: Op, reply: Sender<Value> },
    Profile(Profile),
    Shutdown,
}

/// Owns the session for the daemon's lifetime. Frames are stamped with the
/// pipeline's own monotonic clock so motion and the lock share one timeline.
pub fn run_pipeline(
    profile: Profile,
    rx: Receiver<PipelineMsg>,
    mut sink: Box<dyn IntentSink + Send>,
) -> Result<()> {
    let clock = Instant::now();
    let now_ms = || clock.elapsed().as_millis() as u64;
    let mut session = Session::new(&profile);
    info!("pipeline: session ready ({})", session.state().as_str());

    loop {
        match rx.recv_timeout(LOCK_POLL) {
            Ok(PipelineMsg::Request { op, reply }) => {
                let resp = handle_op(&mut session, op, now_ms(), sink.as_mut());
                // the requester may have given up waiting
                let _ = reply.send(resp);
            }
            Ok(PipelineMsg::Profile(p)) => session.apply_profile(&p),
            Ok(PipelineMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                info!("pipeline: stopping");
                return Ok(());
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        session.poll_lock(now_ms());
    }
}

fn handle_op(session: &mut Session, op: Op, now: u64, sink: &mut dyn IntentSink) -> Value {
    match op {
        Op::Status => json!({"ok": true, "data": session.status(now)}),
        Op::Begin => {
            let started = session.begin();
            json!({"ok": true, "data": {"started": started, "state": session.state()}})
        }
        Op::Reset => {
            let intents = session.reset();
            dispatch_intents(&intents, sink);
            json!({"ok": true, "data": {"state": session.state(), "intents": intents}})
        }
        Op::Frame(points) => {
            let frame = points.and_then(|pts| match LandmarkFrame::from_slice(&pts) {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!("frame rejected, treating as no hand: {e}");
                    None
                }
            });
            let mut out = session.tick(frame.as_ref(), now);
            dispatch_intents(&out.intents, sink);
            out.transforms = session.transforms();
            json!({"ok": true, "data": out})
        }
        Op::Viewport { width, height } => {
            if width > 0.0 && height > 0.0 {
                session.set_viewport(width, height);
                json!({"ok": true, "data": session.viewport()})
            } else {
                json!({"ok": false, "error": "viewport dimensions must be positive"})
            }
        }
        Op::Layout => json!({"ok": true, "data": {
            "state": session.state(),
            "transforms": session.transforms(),
        }}),
        Op::Design { forward } => {
            let d = if forward {
                session.next_design()
            } else {
                session.prev_design()
            };
            json!({"ok": true, "data": {"design": d, "name": d.name()}})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::LogSink;
    use crate::landmarks::LANDMARK_COUNT;
    use std::sync::mpsc;
    use std::thread;

    fn request(tx: &Sender<PipelineMsg>, op: Op) -> Value {
        let (reply, rx) = mpsc::channel();
        tx.send(PipelineMsg::Request { op, reply }).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_pipeline_round_trip() {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            run_pipeline(Profile::default(), rx, Box::new(LogSink))
        });

        let r = request(&tx, Op::Begin);
        assert_eq!(r["data"]["state"], "STACKED");

        // a malformed frame counts as no hand
        let r = request(&tx, Op::Frame(Some(vec![Landmark::new(0.5, 0.5); 3])));
        assert_eq!(r["ok"], true);
        assert_eq!(r["data"]["gesture"], "NONE");
        assert_eq!(r["data"]["transforms"].as_array().map(|a| a.len()), Some(22));

        let r = request(&tx, Op::Frame(Some(vec![Landmark::new(0.5, 0.5); LANDMARK_COUNT])));
        assert_eq!(r["data"]["state"], "STACKED");

        let r = request(
            &tx,
            Op::Viewport {
                width: 0.0,
                height: 10.0,
            },
        );
        assert_eq!(r["ok"], false);

        let r = request(&tx, Op::Design { forward: true });
        assert_eq!(r["data"]["name"], "Celestial Void");

        let r = request(&tx, Op::Status);
        assert_eq!(r["data"]["state"], "STACKED");
        assert_eq!(r["data"]["locked"], false);

        tx.send(PipelineMsg::Shutdown).unwrap();
        handle.join().unwrap().unwrap();
    }
}
