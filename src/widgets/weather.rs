//! Weather widget: one city, or a rotating multi-city display

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};
use crate::registry::Widget;
use crate::utils::Rotator;

const DEFAULT_ROTATION_SEC: u64 = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CityWeather {
    #[serde(default)]
    icon: String,
    temp: f64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    humidity: Option<i32>,
}

impl CityWeather {
    fn line(&self) -> String {
        let mut line = format!("{} {} {:.0}°C {}", self.icon, self.location, self.temp, self.description);
        if let Some(humidity) = self.humidity {
            line.push_str(&format!(" {}%", humidity));
        }
        line.trim().to_string()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultiWeather {
    cities: Vec<CityWeather>,
    #[serde(default)]
    rotation_interval_sec: Option<u64>,
}

pub struct WeatherWidget {
    cities: Vec<CityWeather>,
    rotator: Rotator,
}

impl WeatherWidget {
    pub fn new() -> Self {
        Self {
            cities: Vec::new(),
            rotator: Rotator::new(Duration::from_secs(DEFAULT_ROTATION_SEC)),
        }
    }
}

impl Default for WeatherWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for WeatherWidget {
    fn render(&mut self) -> ClientResult<()> {
        self.cities.clear();
        Ok(())
    }

    /// Accepts both `weather:update` and `weather:multi-update` payloads
    fn update(&mut self, data: &Value) -> ClientResult<()> {
        if data.get("cities").is_some() {
            let multi: MultiWeather = serde_json::from_value(data.clone())?;
            if multi.cities.is_empty() {
                return Err(ClientError::widget("multi-city update without cities"));
            }
            let paused = self.rotator.is_paused();
            let period = Duration::from_secs(multi.rotation_interval_sec.unwrap_or(DEFAULT_ROTATION_SEC));
            self.rotator = Rotator::new(period);
            self.rotator.set_paused(paused);
            self.cities = multi.cities;
        } else {
            let single: CityWeather = serde_json::from_value(data.clone())?;
            self.cities = vec![single];
            self.rotator.reset();
        }
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        self.rotator.set_paused(paused);
    }

    fn view(&self) -> Vec<String> {
        match self.cities.get(self.rotator.index(self.cities.len())) {
            Some(city) => vec![city.line()],
            None => vec!["--".to_string()],
        }
    }
}
