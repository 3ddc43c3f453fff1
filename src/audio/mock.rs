// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{error::Error, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::info;

use super::Renderer;

/// A mock device. Renders only when asked to.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    renderer: Arc<Mutex<Option<Renderer>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, sample_rate: u32) -> Device {
        Device {
            name: name.to_string(),
            sample_rate,
            renderer: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns true if the device has been started.
    pub fn is_running(&self) -> bool {
        self.renderer.lock().is_some()
    }

    /// Renders the given number of stereo frames. Returns None if the device
    /// is not running.
    pub fn render(&self, frames: usize) -> Option<Vec<f32>> {
        let mut renderer = self.renderer.lock();
        let renderer = renderer.as_mut()?;
        let mut output = vec![0.0; frames * 2];
        renderer.render_interleaved(&mut output, 2);
        Some(output)
    }
}

impl super::Device for Device {
    fn start(&self, renderer: Renderer) -> Result<(), Box<dyn Error>> {
        let mut current = self.renderer.lock();
        if current.is_some() {
            return Err(format!("output stream already running on {}", self.name).into());
        }
        info!(device = self.name, "Mock output started");
        *current = Some(renderer);
        Ok(())
    }

    fn stop(&self) {
        if self.renderer.lock().take().is_some() {
            info!(device = self.name, "Mock output stopped");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
