//! Bird sighting records and the commands that change them.

use std::fmt;

use aviary_store::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One tracked bird.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bird {
	pub id: Uuid,
	pub name: String,
	pub species: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sighted_at: Option<DateTime<Utc>>,
}

impl Record for Bird {
	type Key = Uuid;

	fn key(&self) -> Uuid {
		self.id
	}
}

impl fmt::Display for Bird {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.name, self.species)?;
		if let Some(at) = self.sighted_at {
			write!(f, " seen {}", at.format("%Y-%m-%d %H:%M"))?;
		}
		if let Some(notes) = &self.notes {
			write!(f, " - {notes}")?;
		}
		Ok(())
	}
}

/// Request to record a new bird.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewBird {
	pub name: String,
	pub species: String,
	pub notes: Option<String>,
	pub sighted_at: Option<DateTime<Utc>>,
}

impl NewBird {
	pub fn new(name: impl Into<String>, species: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			species: species.into(),
			..Self::default()
		}
	}

	pub(crate) fn into_bird(self, id: Uuid) -> Bird {
		Bird {
			id,
			name: self.name.trim().to_string(),
			species: self.species.trim().to_string(),
			notes: self.notes,
			sighted_at: self.sighted_at,
		}
	}
}

/// Partial update of an existing bird. `None` fields are left as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirdUpdate {
	pub id: Uuid,
	pub name: Option<String>,
	pub species: Option<String>,
	pub notes: Option<String>,
	pub sighted_at: Option<DateTime<Utc>>,
}

impl BirdUpdate {
	pub fn new(id: Uuid) -> Self {
		Self {
			id,
			name: None,
			species: None,
			notes: None,
			sighted_at: None,
		}
	}

	pub(crate) fn apply_to(self, bird: &mut Bird) {
		if let Some(name) = self.name {
			bird.name = name.trim().to_string();
		}
		if let Some(species) = self.species {
			bird.species = species.trim().to_string();
		}
		if self.notes.is_some() {
			bird.notes = self.notes;
		}
		if self.sighted_at.is_some() {
			bird.sighted_at = self.sighted_at;
		}
	}
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn update_only_touches_given_fields() {
		let id = Uuid::new_v4();
		let mut bird = NewBird {
			notes: Some("by the pond".into()),
			..NewBird::new("Rusty", "Robin")
		}
		.into_bird(id);

		let mut update = BirdUpdate::new(id);
		update.species = Some("  European robin ".into());
		update.apply_to(&mut bird);

		assert_eq!(bird.name, "Rusty");
		assert_eq!(bird.species, "European robin");
		assert_eq!(bird.notes.as_deref(), Some("by the pond"));
	}

	#[test]
	fn display_includes_sighting_and_notes() {
		let bird = Bird {
			id: Uuid::nil(),
			name: "Pip".into(),
			species: "Wren".into(),
			notes: Some("nesting".into()),
			sighted_at: Utc.with_ymd_and_hms(2024, 5, 1, 7, 30, 0).single(),
		};
		assert_eq!(bird.to_string(), "Pip (Wren) seen 2024-05-01 07:30 - nesting");
	}

	#[test]
	fn optional_fields_are_omitted_from_json() {
		let bird = NewBird::new("Pip", "Wren").into_bird(Uuid::nil());
		let json = serde_json::to_value(&bird).unwrap();
		assert_eq!(
			json,
			serde_json::json!({ "id": "00000000-0000-0000-0000-000000000000", "name": "Pip", "species": "Wren" })
		);
		let back: Bird = serde_json::from_value(json).unwrap();
		assert_eq!(back, bird);
	}
}
