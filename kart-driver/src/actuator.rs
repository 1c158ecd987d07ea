use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ActuatorError {
    #[error("unknown emulator '{0}'")]
    UnknownEmulator(String),
    #[error("'{label}' is not a valid input mapping for {emulator}")]
    UnknownLabel { label: String, emulator: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    Press(&'static str),
    Release(&'static str),
}

/// Accepts symbolic action labels and turns them into device input
pub trait Actuator {
    fn actuate(&mut self, labels: &[&str]) -> Result<(), ActuatorError>;
}

/// Receives the key events of an [EmulatorActuator]
pub trait KeySink {
    fn send(&mut self, event: KeyEvent);
}

/// Writes key events to the log instead of injecting them into the OS
#[derive(Debug, Default)]
pub struct LogKeySink;

impl KeySink for LogKeySink {
    fn send(&mut self, event: KeyEvent) {
        log::debug!("{:?}", event);
    }
}

impl KeySink for Vec<KeyEvent> {
    fn send(&mut self, event: KeyEvent) {
        self.push(event)
    }
}

/// Label -> key table of one emulator
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMapping {
    emulator: String,
    keys: Vec<(&'static str, &'static str)>,
}

impl KeyMapping {
    /// Emulator names are matched case-insensitively
    pub fn for_emulator(emulator: &str) -> Result<Self, ActuatorError> {
        let emulator = emulator.to_lowercase();
        let keys = match emulator.as_str() {
            "mupen 64" | "mupen64" => vec![
                ("throttle", "x"),
                ("left", "left"),
                ("right", "right"),
                ("up", "up"),
                ("down", "down"),
            ],
            _ => return Err(ActuatorError::UnknownEmulator(emulator)),
        };
        Ok(Self { emulator, keys })
    }

    pub fn emulator(&self) -> &str {
        &self.emulator
    }

    pub fn key(&self, label: &str) -> Result<&'static str, ActuatorError> {
        self.keys
            .iter()
            .find(|(l, _)| *l == label)
            .map(|&(_, key)| key)
            .ok_or_else(|| ActuatorError::UnknownLabel {
                label: label.to_string(),
                emulator: self.emulator.clone(),
            })
    }
}

/// Presses all keys of one tick, then releases them again
pub struct EmulatorActuator<S: KeySink> {
    mapping: KeyMapping,
    sink: S,
}

impl<S: KeySink> EmulatorActuator<S> {
    pub fn new(mapping: KeyMapping, sink: S) -> Self {
        Self { mapping, sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: KeySink> Actuator for EmulatorActuator<S> {
    /// All labels are resolved before the first key goes out
    fn actuate(&mut self, labels: &[&str]) -> Result<(), ActuatorError> {
        let keys = labels
            .iter()
            .map(|label| self.mapping.key(label))
            .collect::<Result<Vec<_>, _>>()?;
        for &key in &keys {
            self.sink.send(KeyEvent::Press(key));
        }
        for &key in &keys {
            self.sink.send(KeyEvent::Release(key));
        }
        Ok(())
    }
}
