use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use crate::classify::DriverModel;
use crate::device::{
    DeviceEvent, DeviceKind, DriverConfig, DriverFactory, FitnessDevice, MetricUpdate,
};
use crate::error::FixtureError;
use crate::radio::DeviceDescriptor;

/// One step of a scripted driver session.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Report a speed sample in km/h.
    Speed(f64),
    /// Report an inclination sample in percent.
    Incline(f64),
    /// Emit a diagnostic line.
    Debug(String),
    /// Wait before playing the next step.
    Delay(Duration),
    /// Drop the connection; later steps never play.
    Disconnect,
}

/// Parsed driver script fixture.
///
/// Scripts are comma-separated steps such as
/// `speed:12.5,incline:3.0,delay:250ms,disconnect`. An empty script leaves
/// the driver connected and silent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverScript {
    steps: Vec<ScriptStep>,
}

impl DriverScript {
    /// Steps in playback order.
    #[must_use]
    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }
}

impl FromStr for DriverScript {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Ok(Self::default());
        }

        let steps = value
            .split(',')
            .map(parse_script_step)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }
}

/// Builds scripted drivers that replay one fixture script per session.
#[derive(Debug, Clone)]
pub struct ScriptedDriverFactory {
    script: DriverScript,
}

impl ScriptedDriverFactory {
    /// Creates a factory whose drivers replay `script`.
    #[must_use]
    pub fn new(script: DriverScript) -> Self {
        Self { script }
    }
}

impl DriverFactory for ScriptedDriverFactory {
    fn build(&self, model: DriverModel, config: &DriverConfig) -> Box<dyn FitnessDevice> {
        Box::new(ScriptedDevice::new(model.kind(), self.script.clone(), config))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct MetricSnapshot {
    speed: f64,
    inclination: f64,
}

/// Driver that replays a fixture script instead of talking to hardware.
#[derive(Debug)]
pub(crate) struct ScriptedDevice {
    kind: DeviceKind,
    script: DriverScript,
    verbose: bool,
    metrics: Arc<Mutex<MetricSnapshot>>,
    playback: Option<JoinHandle<()>>,
}

impl ScriptedDevice {
    fn new(kind: DeviceKind, script: DriverScript, config: &DriverConfig) -> Self {
        Self {
            kind,
            script,
            verbose: config.verbose(),
            metrics: Arc::default(),
            playback: None,
        }
    }
}

impl FitnessDevice for ScriptedDevice {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn current_speed(&self) -> f64 {
        lock_metrics(&self.metrics).speed
    }

    fn current_inclination(&self) -> f64 {
        lock_metrics(&self.metrics).inclination
    }

    fn restore_metrics(&mut self, speed: f64, inclination: f64) {
        let mut metrics = lock_metrics(&self.metrics);
        metrics.speed = speed;
        metrics.inclination = inclination;
    }

    fn open(&mut self, descriptor: DeviceDescriptor, events: mpsc::Sender<DeviceEvent>) {
        if self.playback.is_some() {
            debug!("ignoring repeated open of a scripted driver");
            return;
        }

        let opening_line = self.verbose.then(|| {
            format!("scripted {} driver opened for {}", self.kind, descriptor.address())
        });
        self.playback = Some(tokio::spawn(play_script(
            self.script.steps().to_vec(),
            Arc::clone(&self.metrics),
            events,
            opening_line,
        )));
    }
}

impl Drop for ScriptedDevice {
    fn drop(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.abort();
        }
    }
}

async fn play_script(
    steps: Vec<ScriptStep>,
    metrics: Arc<Mutex<MetricSnapshot>>,
    events: mpsc::Sender<DeviceEvent>,
    opening_line: Option<String>,
) {
    if let Some(text) = opening_line
        && events.send(DeviceEvent::Debug(text)).await.is_err()
    {
        return;
    }

    for step in steps {
        let event = match step {
            ScriptStep::Speed(value) => {
                lock_metrics(&metrics).speed = value;
                DeviceEvent::Metric(MetricUpdate::Speed(value))
            }
            ScriptStep::Incline(value) => {
                lock_metrics(&metrics).inclination = value;
                DeviceEvent::Metric(MetricUpdate::Inclination(value))
            }
            ScriptStep::Debug(text) => DeviceEvent::Debug(text),
            ScriptStep::Delay(duration) => {
                sleep(duration).await;
                continue;
            }
            ScriptStep::Disconnect => {
                let _ = events.send(DeviceEvent::Disconnected).await;
                return;
            }
        };

        if events.send(event).await.is_err() {
            return;
        }
    }

    // Without a scripted disconnect the device stays connected until the
    // session is released.
    events.closed().await;
}

fn lock_metrics(metrics: &Mutex<MetricSnapshot>) -> MutexGuard<'_, MetricSnapshot> {
    metrics.lock().expect("metrics lock should not be poisoned")
}

fn parse_script_step(raw_step: &str) -> Result<ScriptStep, FixtureError> {
    let step = raw_step.trim();
    if step == "disconnect" {
        return Ok(ScriptStep::Disconnect);
    }

    let Some((keyword, value)) = step.split_once(':') else {
        return Err(FixtureError::UnknownScriptStep {
            step: step.to_string(),
        });
    };
    let invalid_value = || FixtureError::InvalidScriptValue {
        step: step.to_string(),
    };
    match keyword.trim() {
        "speed" => value
            .trim()
            .parse()
            .map(ScriptStep::Speed)
            .map_err(|_| invalid_value()),
        "incline" => value
            .trim()
            .parse()
            .map(ScriptStep::Incline)
            .map_err(|_| invalid_value()),
        "debug" => Ok(ScriptStep::Debug(value.trim().to_string())),
        "delay" => humantime::parse_duration(value.trim())
            .map(ScriptStep::Delay)
            .map_err(|_| invalid_value()),
        _ => Err(FixtureError::UnknownScriptStep {
            step: step.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn treadmill(script: &str, config: &DriverConfig) -> Box<dyn FitnessDevice> {
        let factory =
            ScriptedDriverFactory::new(script.parse().expect("script fixture should parse"));
        factory.build(DriverModel::DomyosTreadmill, config)
    }

    fn descriptor() -> DeviceDescriptor {
        DeviceDescriptor::new("Domyos Treadmill", "AA:BB:CC:DD:EE", Some(1796))
    }

    #[test]
    fn parse_script_resolves_every_step_keyword() {
        let script: DriverScript = "speed:12.5,incline:3.0,debug:warming up,delay:250ms,disconnect"
            .parse()
            .expect("script fixture should parse");

        assert_eq!(
            vec![
                ScriptStep::Speed(12.5),
                ScriptStep::Incline(3.0),
                ScriptStep::Debug("warming up".to_string()),
                ScriptStep::Delay(Duration::from_millis(250)),
                ScriptStep::Disconnect,
            ],
            script.steps().to_vec()
        );
    }

    #[test]
    fn parse_script_tolerates_surrounding_whitespace() {
        let script: DriverScript = " speed:2.0 , disconnect "
            .parse()
            .expect("script fixture should parse");

        assert_eq!(2, script.steps().len());
    }

    #[test]
    fn empty_script_parses_to_no_steps() {
        let script: DriverScript = "  ".parse().expect("empty script should parse");

        assert_eq!(DriverScript::default(), script);
    }

    #[rstest]
    #[case::unknown_keyword("jump:1")]
    #[case::missing_separator("speed")]
    fn parse_script_rejects_unknown_steps(#[case] raw: &str) {
        assert_matches!(
            raw.parse::<DriverScript>(),
            Err(FixtureError::UnknownScriptStep { .. })
        );
    }

    #[rstest]
    #[case::speed("speed:fast")]
    #[case::incline("incline:steep")]
    #[case::delay("delay:soon")]
    fn parse_script_rejects_invalid_values(#[case] raw: &str) {
        assert_matches!(
            raw.parse::<DriverScript>(),
            Err(FixtureError::InvalidScriptValue { .. })
        );
    }

    #[tokio::test]
    async fn playback_updates_metrics_before_emitting_each_event() {
        let config = DriverConfig::default();
        let mut device = treadmill("speed:12.5,incline:3.0,debug:halfway,disconnect", &config);
        let (events, mut session) = mpsc::channel(8);

        device.open(descriptor(), events);

        assert_eq!(
            Some(DeviceEvent::Metric(MetricUpdate::Speed(12.5))),
            session.recv().await
        );
        assert_eq!(12.5, device.current_speed());
        assert_eq!(
            Some(DeviceEvent::Metric(MetricUpdate::Inclination(3.0))),
            session.recv().await
        );
        assert_eq!(3.0, device.current_inclination());
        assert_eq!(
            Some(DeviceEvent::Debug("halfway".to_string())),
            session.recv().await
        );
        assert_eq!(Some(DeviceEvent::Disconnected), session.recv().await);
        assert_eq!(None, session.recv().await);
    }

    #[tokio::test]
    async fn script_without_disconnect_keeps_the_session_open() {
        let config = DriverConfig::default();
        let mut device = treadmill("speed:5.0", &config);
        let (events, mut session) = mpsc::channel(8);

        device.open(descriptor(), events);
        session.recv().await.expect("metric event should arrive");

        assert_matches!(session.try_recv(), Err(mpsc::error::TryRecvError::Empty));
    }

    #[tokio::test]
    async fn steps_after_disconnect_never_play() {
        let config = DriverConfig::default();
        let mut device = treadmill("disconnect,speed:9.9", &config);
        let (events, mut session) = mpsc::channel(8);

        device.open(descriptor(), events);

        assert_eq!(Some(DeviceEvent::Disconnected), session.recv().await);
        assert_eq!(None, session.recv().await);
        assert_eq!(0.0, device.current_speed());
    }

    #[tokio::test]
    async fn verbose_drivers_announce_the_opened_session() {
        let config = DriverConfig::builder().verbose(true).build();
        let mut device = treadmill("disconnect", &config);
        let (events, mut session) = mpsc::channel(8);

        device.open(descriptor(), events);

        let first = session.recv().await.expect("opening line should arrive");
        assert_matches!(
            first,
            DeviceEvent::Debug(text) if text.contains("AA:BB:CC:DD:EE")
        );
    }

    #[test]
    fn restore_metrics_seeds_current_values_without_a_session() {
        let config = DriverConfig::default();
        let mut device = treadmill("", &config);

        device.restore_metrics(12.5, 3.0);

        assert_eq!(12.5, device.current_speed());
        assert_eq!(3.0, device.current_inclination());
        assert_eq!(DeviceKind::Treadmill, device.kind());
    }
}
