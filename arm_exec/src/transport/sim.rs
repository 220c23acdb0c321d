//! Simulated controller
//!
//! Acknowledges every command and keeps track of the arm's joint and Cartesian position so the
//! executable can run without hardware. Every line written to it is recorded, and replies can be
//! scripted per command word, which is what the unit tests use to inspect and perturb exchanges.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{Transport, TransportError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Joint position of a freshly started simulated arm (z, shoulder, elbow, wrist, gripper, rail).
const SIM_HOME_JOINTS: [f64; 6] = [400.0, 0.0, 180.0, 0.0, 120.0, 0.0];

/// Cartesian position of a freshly started simulated arm.
const SIM_HOME_CARTESIAN: [f64; 6] = [300.0, 0.0, 400.0, 0.0, 90.0, 180.0];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to a simulated controller. Clones share the same controller.
#[derive(Clone)]
pub struct SimController {
    inner: Arc<Mutex<SimInner>>,
}

struct SimInner {
    /// Every line received, in order
    sent: Vec<String>,

    /// Lines waiting to be read
    pending: VecDeque<String>,

    /// Scripted replies keyed by command word, each entry being the lines sent for one command
    scripted: HashMap<String, VecDeque<Vec<String>>>,

    joints: Vec<f64>,
    cartesian: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimController {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimInner {
                sent: Vec::new(),
                pending: VecDeque::new(),
                scripted: HashMap::new(),
                joints: SIM_HOME_JOINTS.to_vec(),
                cartesian: SIM_HOME_CARTESIAN.to_vec(),
            })),
        }
    }

    /// Script the reply lines for the next command starting with `word`.
    ///
    /// Scripts for the same word are used in the order they were added.
    pub fn script(&self, word: &str, lines: &[&str]) {
        self.lock()
            .scripted
            .entry(word.to_string())
            .or_default()
            .push_back(lines.iter().map(|l| l.to_string()).collect());
    }

    /// Queue a line to be read without it answering any command, like a reply arriving late.
    pub fn push_reply(&self, line: &str) {
        self.lock().pending.push_back(line.to_string());
    }

    /// Lines waiting to be read.
    pub fn pending(&self) -> Vec<String> {
        self.lock().pending.iter().cloned().collect()
    }

    /// All lines received so far.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Lines received so far, excluding the motion complete waits.
    pub fn sent_commands(&self) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|l| l.as_str() != super::WAIT_FOR_EOM_CMD)
            .cloned()
            .collect()
    }

    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    pub fn set_joints(&self, joints: &[f64]) {
        self.lock().joints = joints.to_vec();
    }

    pub fn set_cartesian(&self, cartesian: &[f64]) {
        self.lock().cartesian = cartesian.to_vec();
    }

    fn lock(&self) -> MutexGuard<'_, SimInner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for SimController {
    fn default() -> Self {
        Self::new()
    }
}

impl SimInner {
    /// Work out the reply lines for a received command.
    fn respond(&mut self, line: &str) -> Vec<String> {
        let mut tokens = line.split_whitespace();
        let word = tokens.next().unwrap_or("");

        if let Some(lines) = self.scripted.get_mut(word).and_then(|q| q.pop_front()) {
            return lines;
        }

        let reply = match word {
            "wherej" => format!("0 {}", format_values(&self.joints)),
            // Trailing value is the arm configuration flag
            "wherec" => format!("0 {} 1", format_values(&self.cartesian)),
            "movej" => {
                // Skip the profile
                tokens.next();
                if let Some(v) = parse_values(tokens) {
                    self.joints = v;
                }
                String::from("0")
            }
            "movec" => {
                tokens.next();
                if let Some(v) = parse_values(tokens) {
                    self.cartesian = v;
                }
                String::from("0")
            }
            "graspplate" => String::from("0 -1"),
            _ => String::from("0"),
        };

        vec![reply]
    }
}

impl Transport for SimController {
    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();

        inner.sent.push(line.to_string());
        let reply = inner.respond(line);
        inner.pending.extend(reply);

        Ok(())
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        match self.lock().pending.pop_front() {
            Some(l) => Ok(l),
            None => Err(TransportError::ReadError(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "the simulated controller has nothing to send",
            ))),
        }
    }

    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> Result<(), TransportError> {
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:.3}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_values<'a, I: Iterator<Item = &'a str>>(tokens: I) -> Option<Vec<f64>> {
    tokens.map(|t| t.parse().ok()).collect()
}
