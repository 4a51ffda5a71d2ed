use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Named easing curves applied to linear progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
	#[default]
	Linear,
	EaseIn,
	EaseOut,
	EaseInOut,
	EaseInCubic,
	EaseOutCubic,
	EaseInOutCubic,
	EaseInSine,
	EaseOutSine,
	EaseInOutSine,
	EaseOutBack,
	EaseOutBounce,
}

impl Easing {
	/// Map linear progress in `[0, 1]` through the curve.
	///
	/// Endpoints are exact; `EaseOutBack` overshoots past 1 in between.
	pub fn apply(self, t: f64) -> f64 {
		let t = t.clamp(0.0, 1.0);
		match self {
			Self::Linear => t,
			Self::EaseIn => t * t,
			Self::EaseOut => t * (2.0 - t),
			Self::EaseInOut => {
				if t < 0.5 {
					2.0 * t * t
				} else {
					-1.0 + (4.0 - 2.0 * t) * t
				}
			}
			Self::EaseInCubic => t * t * t,
			Self::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
			Self::EaseInOutCubic => {
				if t < 0.5 {
					4.0 * t * t * t
				} else {
					1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
				}
			}
			Self::EaseInSine => 1.0 - (t * PI / 2.0).cos(),
			Self::EaseOutSine => (t * PI / 2.0).sin(),
			Self::EaseInOutSine => -((PI * t).cos() - 1.0) / 2.0,
			Self::EaseOutBack => {
				const C1: f64 = 1.701_58;
				const C3: f64 = C1 + 1.0;
				1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
			}
			Self::EaseOutBounce => bounce_out(t),
		}
	}

	/// Accepts `easeOut`, `ease-out`, `ease_out` and `EaseOut`
	pub fn from_name(name: &str) -> Option<Self> {
		let normalized: String = name.chars().filter(|c| *c != '-' && *c != '_').flat_map(char::to_lowercase).collect();
		let easing = match normalized.as_str() {
			"linear" => Self::Linear,
			"easein" | "easeinquad" => Self::EaseIn,
			"easeout" | "easeoutquad" => Self::EaseOut,
			"easeinout" | "easeinoutquad" => Self::EaseInOut,
			"easeincubic" => Self::EaseInCubic,
			"easeoutcubic" => Self::EaseOutCubic,
			"easeinoutcubic" => Self::EaseInOutCubic,
			"easeinsine" => Self::EaseInSine,
			"easeoutsine" => Self::EaseOutSine,
			"easeinoutsine" => Self::EaseInOutSine,
			"easeoutback" => Self::EaseOutBack,
			"easeoutbounce" | "bounce" => Self::EaseOutBounce,
			_ => return None,
		};
		Some(easing)
	}

	pub fn name(self) -> &'static str {
		match self {
			Self::Linear => "linear",
			Self::EaseIn => "easeIn",
			Self::EaseOut => "easeOut",
			Self::EaseInOut => "easeInOut",
			Self::EaseInCubic => "easeInCubic",
			Self::EaseOutCubic => "easeOutCubic",
			Self::EaseInOutCubic => "easeInOutCubic",
			Self::EaseInSine => "easeInSine",
			Self::EaseOutSine => "easeOutSine",
			Self::EaseInOutSine => "easeInOutSine",
			Self::EaseOutBack => "easeOutBack",
			Self::EaseOutBounce => "easeOutBounce",
		}
	}
}

fn bounce_out(t: f64) -> f64 {
	const N1: f64 = 7.5625;
	const D1: f64 = 2.75;

	if t < 1.0 / D1 {
		N1 * t * t
	} else if t < 2.0 / D1 {
		let t = t - 1.5 / D1;
		N1 * t * t + 0.75
	} else if t < 2.5 / D1 {
		let t = t - 2.25 / D1;
		N1 * t * t + 0.9375
	} else {
		let t = t - 2.625 / D1;
		N1 * t * t + 0.984_375
	}
}

impl FromStr for Easing {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_name(s).ok_or_else(|| format!("unknown easing '{s}'"))
	}
}

impl fmt::Display for Easing {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}
