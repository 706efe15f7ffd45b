//! Offline replay of a recorded landmark trace through a session.
//!
//! A trace is JSON lines, one event per line:
//!
//! ```text
//! {"kind":"begin"}
//! {"kind":"viewport","width":390,"height":844}
//! {"kind":"frame","t_ms":16,"landmarks":[{"x":0.5,"y":0.8}, ...]}
//! {"kind":"frame","t_ms":33,"landmarks":null}
//! {"kind":"reset"}
//! ```

use anyhow::{Result, anyhow};
use log::warn;
use serde::Deserialize;
use std::io::{BufRead, Write};

use crate::actions::{IntentSink, dispatch_intents};
use crate::config::Profile;
use crate::landmarks::{Landmark, LandmarkFrame};
use crate::session::Session;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    Begin,
    Reset,
    Viewport {
        width: f32,
        height: f32,
    },
    Frame {
        t_ms: u64,
        #[serde(default)]
        landmarks: Option<Vec<Landmark>>,
    },
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub rejected: usize,
    pub intents: usize,
    pub transitions: usize,
}

pub struct ReplayOptions {
    pub seed: Option<u64>,
    pub with_layout: bool,
}

pub fn replay<R: BufRead, W: Write>(
    profile: &Profile,
    trace: R,
    out: &mut W,
    sink: &mut dyn IntentSink,
    opts: &ReplayOptions,
) -> Result<ReplaySummary> {
    let mut session = match opts.seed {
        Some(seed) => Session::with_seed(profile, seed),
        None => Session::new(profile),
    };
    let mut summary = ReplaySummary::default();

    for (lineno, line) in trace.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: TraceEvent = serde_json::from_str(&line)
            .map_err(|e| anyhow!("trace line {}: {e}", lineno + 1))?;

        match event {
            TraceEvent::Begin => {
                session.begin();
            }
            TraceEvent::Reset => dispatch_intents(&session.reset(), sink),
            TraceEvent::Viewport { width, height } => {
                if width > 0.0 && height > 0.0 {
                    session.set_viewport(width, height);
                } else {
                    warn!("trace line {}: ignoring empty viewport", lineno + 1);
                }
            }
            TraceEvent::Frame { t_ms, landmarks } => {
                let frame = match landmarks.map(|pts| LandmarkFrame::from_slice(&pts)) {
                    Some(Ok(f)) => Some(f),
                    Some(Err(e)) => {
                        warn!("trace line {}: {e}; treating as no hand", lineno + 1);
                        summary.rejected += 1;
                        None
                    }
                    None => None,
                };
                let before = session.state();
                let mut tick = session.tick(frame.as_ref(), t_ms);
                if tick.state != before {
                    summary.transitions += 1;
                }
                dispatch_intents(&tick.intents, sink);
                summary.frames += 1;
                summary.intents += tick.intents.len();
                if opts.with_layout {
                    tick.transforms = session.transforms();
                }
                writeln!(out, "{}", serde_json::to_string(&tick)?)?;
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::JsonLinesSink;
    use crate::landmarks::LandmarkFrame;
    use crate::landmarks::fixtures::{hand, pointing_at};
    use crate::landmarks::LANDMARK_COUNT;

    fn frame_line(t_ms: u64, frame: &LandmarkFrame) -> String {
        let pts: Vec<_> = (0..LANDMARK_COUNT)
            .map(|i| {
                let p = frame.get(i);
                serde_json::json!({"x": p.x, "y": p.y})
            })
            .collect();
        serde_json::json!({"kind": "frame", "t_ms": t_ms, "landmarks": pts}).to_string()
    }

    fn run(trace: &str, with_layout: bool) -> (ReplaySummary, String, String) {
        let mut out = Vec::new();
        let mut sink = JsonLinesSink::new(Vec::new());
        let opts = ReplayOptions {
            seed: Some(11),
            with_layout,
        };
        let summary =
            replay(&Profile::default(), trace.as_bytes(), &mut out, &mut sink, &opts).unwrap();
        (
            summary,
            String::from_utf8(out).unwrap(),
            String::from_utf8(sink.into_inner()).unwrap(),
        )
    }

    #[test]
    fn test_replays_a_reading() {
        let mut lines = vec![r#"{"kind":"begin"}"#.to_string()];
        lines.push(frame_line(0, &hand([true; 4])));
        lines.push(frame_line(16, &hand([true, false, false, false])));
        for (k, a) in [0.0, 5.0, 10.0, 15.0, -10.0].into_iter().enumerate() {
            lines.push(frame_line(32 + 16 * k as u64, &pointing_at(a)));
        }
        lines.push(r#"{"kind":"frame","t_ms":200,"landmarks":null}"#.to_string());

        let (summary, out, intents) = run(&lines.join("\n"), false);
        assert_eq!(summary.frames, 8);
        assert_eq!(summary.transitions, 3);
        assert_eq!(summary.intents, 3);
        assert_eq!(summary.rejected, 0);

        let last: serde_json::Value = serde_json::from_str(out.lines().last().unwrap()).unwrap();
        assert_eq!(last["state"], "REVEALED");
        assert_eq!(last["motion"]["x"], 0.5);
        assert!(last.get("transforms").is_none());

        let kinds: Vec<serde_json::Value> = intents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(kinds[0]["intent"], "PLAY_SHUFFLE_SOUND");
        assert_eq!(kinds[1]["intent"], "PLAY_FLIP_SOUND");
        assert_eq!(kinds[2]["intent"], "BEGIN_INTERPRETATION");
    }

    #[test]
    fn test_bad_frames_count_as_no_hand() {
        let trace = r#"{"kind":"begin"}
{"kind":"frame","t_ms":0,"landmarks":[{"x":0.1,"y":0.1}]}
{"kind":"viewport","width":400,"height":800}"#;
        let (summary, out, _) = run(trace, true);
        assert_eq!(summary.rejected, 1);
        let tick: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(tick["gesture"], "NONE");
        assert_eq!(tick["transforms"].as_array().unwrap().len(), 22);
    }

    struct Muted;

    impl IntentSink for Muted {
        fn deliver(&mut self, _: &crate::machine::Intent) -> Result<()> {
            Err(anyhow!("audio device gone"))
        }
    }

    #[test]
    fn test_failing_sink_does_not_stop_replay() {
        let trace = [
            r#"{"kind":"begin"}"#.to_string(),
            frame_line(0, &hand([true; 4])),
            frame_line(16, &hand([false; 4])),
            r#"{"kind":"reset"}"#.to_string(),
        ]
        .join("\n");
        let mut out = Vec::new();
        let opts = ReplayOptions {
            seed: Some(3),
            with_layout: false,
        };
        let summary =
            replay(&Profile::default(), trace.as_bytes(), &mut out, &mut Muted, &opts).unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.intents, 1);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let opts = ReplayOptions {
            seed: None,
            with_layout: false,
        };
        let err = replay(
            &Profile::default(),
            "{\"kind\":\"warp\"}".as_bytes(),
            &mut Vec::new(),
            &mut sink,
            &opts,
        )
        .unwrap_err();
        assert!(err.to_string().contains("trace line 1"));
    }
}
