use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use crate::netinfo::IpInfo;
use crate::settings::{Settings, SettingsField};
use crate::speedtest::{SpeedTest, SpeedTestResult, TestPhase, TestUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    Main,
    Settings,
}

#[derive(Debug, Clone, Copy)]
pub enum AppAction {
    Quit,
    StartTest,
}

pub struct App {
    pub test: SpeedTest,
    pub settings: Settings,
    pub should_quit: bool,

    // UI state
    pub view: AppView,
    pub selected_setting: SettingsField,

    // Display accumulator folded from the event stream
    pub result: SpeedTestResult,
    pub current_mbps: f64,
    pub rate_samples: Vec<f64>,
    pub error_message: Option<String>,
    pub ip_info: Option<IpInfo>,
}

impl App {
    pub fn new() -> Result<Self> {
        Ok(Self {
            test: SpeedTest::new()?,
            settings: Settings::default(),
            should_quit: false,
            view: AppView::Main,
            selected_setting: SettingsField::ProbeCount,
            result: SpeedTestResult::default(),
            current_mbps: 0.0,
            rate_samples: Vec::new(),
            error_message: None,
            ip_info: None,
        })
    }

    pub fn phase(&self) -> TestPhase {
        self.test.phase()
    }

    fn idle(&self) -> bool {
        matches!(self.phase(), TestPhase::Idle | TestPhase::Complete)
    }

    pub fn handle_key_event(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match self.view {
            AppView::Main => self.handle_main_key(key),
            AppView::Settings => self.handle_settings_key(key),
        }
    }

    fn handle_main_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Some(AppAction::Quit)
            }
            KeyCode::Char('s') => {
                if self.idle() {
                    self.view = AppView::Settings;
                }
                None
            }
            KeyCode::Enter => {
                // The engine refuses a start mid-run anyway; the gate here
                // just keeps the UI honest.
                if self.idle() {
                    Some(AppAction::StartTest)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn handle_settings_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => {
                self.view = AppView::Main;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_setting = self.selected_setting.prev();
                None
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.selected_setting = self.selected_setting.next();
                None
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.settings.decrease(self.selected_setting);
                None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.settings.increase(self.selected_setting);
                None
            }
            _ => None,
        }
    }

    pub fn reset_for_new_test(&mut self) {
        self.result = SpeedTestResult::default();
        self.current_mbps = 0.0;
        self.rate_samples.clear();
        self.error_message = None;
    }

    pub fn handle_update(&mut self, update: TestUpdate) {
        match update {
            TestUpdate::PingComplete { avg_ms, jitter_ms } => {
                self.result.ping_ms = avg_ms;
                self.result.jitter_ms = jitter_ms;
                self.start_stage_display();
            }
            TestUpdate::DownloadProgress { mbps } => {
                self.result.download_mbps = mbps;
                self.push_rate(mbps);
            }
            TestUpdate::DownloadComplete { mbps } => {
                self.result.download_mbps = mbps;
                self.start_stage_display();
            }
            TestUpdate::UploadProgress { mbps } => {
                self.result.upload_mbps = mbps;
                self.push_rate(mbps);
            }
            TestUpdate::UploadComplete { mbps } => {
                self.result.upload_mbps = mbps;
                self.current_mbps = 0.0;
                if let Some(finalized) = self.test.results() {
                    self.result = finalized;
                }
            }
            TestUpdate::RunFailed { reason } => {
                self.error_message = Some(reason);
                self.start_stage_display();
            }
        }
    }

    fn start_stage_display(&mut self) {
        self.current_mbps = 0.0;
        self.rate_samples.clear();
    }

    fn push_rate(&mut self, mbps: f64) {
        self.current_mbps = mbps;
        self.rate_samples.push(mbps);
        if self.rate_samples.len() > 200 {
            self.rate_samples.remove(0);
        }
    }

    /// Copyable one-line summary for the completed view.
    pub fn share_line(&self) -> String {
        format!(
            "Download: {:.1} Mbps | Upload: {:.1} Mbps | Ping: {:.0} ms",
            self.result.download_mbps, self.result.upload_mbps, self.result.ping_ms
        )
    }
}

pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}
