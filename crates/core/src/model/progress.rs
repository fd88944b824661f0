use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::catalog::{MODULE_COUNT, known_module_ids};
use crate::model::ids::{AssessmentId, ModuleId, SectionId};
use crate::model::timestamp;

//
// ─── MODULE STATUS ─────────────────────────────────────────────────────────────
//

/// Completion flag for a single module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStatus {
    #[serde(default)]
    pub completed: bool,
    #[serde(default, with = "timestamp::lenient_option")]
    pub completed_at: Option<DateTime<Utc>>,
}

//
// ─── ASSESSMENT RESULT ─────────────────────────────────────────────────────────
//

/// Latest submission for one assessment. `answers` is stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub assessment_id: AssessmentId,
    #[serde(default)]
    pub answers: Value,
    pub score: f64,
    #[serde(with = "timestamp::lenient")]
    pub completed_at: DateTime<Utc>,
}

//
// ─── PROGRESS STATE ────────────────────────────────────────────────────────────
//

/// Everything tracked for one learner.
///
/// `total_progress` is derived from `module_progress`; every mutation goes
/// through [`ProgressState::recompute_total`] so the two never drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    #[serde(default)]
    pub completed_sections: BTreeSet<SectionId>,
    #[serde(default)]
    pub module_progress: BTreeMap<ModuleId, ModuleStatus>,
    #[serde(default)]
    pub assessment_scores: Vec<AssessmentResult>,
    #[serde(default)]
    pub total_progress: f64,
    #[serde(default)]
    pub last_accessed_module: Option<ModuleId>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::empty()
    }
}

impl ProgressState {
    /// The zero-value record: no sections, no modules, no assessments.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            completed_sections: BTreeSet::new(),
            module_progress: BTreeMap::new(),
            assessment_scores: Vec::new(),
            total_progress: 0.0,
            last_accessed_module: None,
        }
    }

    /// Default snapshot with every known module present and incomplete.
    #[must_use]
    pub fn with_known_modules() -> Self {
        let mut state = Self::empty();
        state.module_progress = known_module_ids()
            .map(|id| (id, ModuleStatus::default()))
            .collect();
        state
    }

    /// Mark a section (and its module) complete or incomplete.
    ///
    /// Adding an already-completed section or removing an absent one is a
    /// no-op for `completed_sections`. The module entry is created on demand.
    /// `completed_at` is stamped when completing and left as-is when
    /// un-completing.
    pub fn apply_section_toggle(
        &mut self,
        section_id: &SectionId,
        module_id: &ModuleId,
        completed: bool,
        now: DateTime<Utc>,
    ) {
        if completed {
            self.completed_sections.insert(section_id.clone());
        } else {
            self.completed_sections.remove(section_id);
        }

        let status = self.module_progress.entry(module_id.clone()).or_default();
        status.completed = completed;
        if completed {
            status.completed_at = Some(now);
        }

        self.last_accessed_module = Some(module_id.clone());
        self.recompute_total();
    }

    /// Replace the result for `assessment_id`, or append it if absent.
    pub fn upsert_assessment(
        &mut self,
        assessment_id: &AssessmentId,
        answers: Value,
        score: f64,
        now: DateTime<Utc>,
    ) {
        let result = AssessmentResult {
            assessment_id: assessment_id.clone(),
            answers,
            score,
            completed_at: now,
        };

        match self
            .assessment_scores
            .iter_mut()
            .find(|existing| existing.assessment_id == *assessment_id)
        {
            Some(existing) => *existing = result,
            None => self.assessment_scores.push(result),
        }
    }

    /// Recompute `total_progress` from module completion.
    pub fn recompute_total(&mut self) {
        // Counts are bounded by the module map size; precision loss is not a concern.
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.completed_module_count() as f64 / MODULE_COUNT as f64;
        self.total_progress = (ratio * 100.0).clamp(0.0, 100.0);
    }

    /// Collapse duplicate assessment entries (last one wins) and recompute the
    /// total, so snapshots from any source satisfy the state invariants.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let mut deduped: Vec<AssessmentResult> = Vec::with_capacity(self.assessment_scores.len());
        for result in self.assessment_scores.drain(..) {
            match deduped
                .iter_mut()
                .find(|existing| existing.assessment_id == result.assessment_id)
            {
                Some(existing) => *existing = result,
                None => deduped.push(result),
            }
        }
        self.assessment_scores = deduped;
        self.recompute_total();
        self
    }

    /// Decode an adapter snapshot and normalize it.
    ///
    /// Only a JSON object is a snapshot: every field has a default, so a
    /// derived decode would also accept `[]` or `null` as an empty record.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the value is not an object or a field
    /// has the wrong shape.
    pub fn from_snapshot(value: Value) -> Result<Self, serde_json::Error> {
        if !value.is_object() {
            return Err(serde::de::Error::custom(format!(
                "progress snapshot must be an object, got {}",
                json_kind(&value)
            )));
        }
        serde_json::from_value::<Self>(value).map(Self::normalized)
    }

    #[must_use]
    pub fn completed_module_count(&self) -> usize {
        self.module_progress
            .values()
            .filter(|status| status.completed)
            .count()
    }

    #[must_use]
    pub fn is_section_completed(&self, section_id: &SectionId) -> bool {
        self.completed_sections.contains(section_id)
    }

    #[must_use]
    pub fn is_module_completed(&self, module_id: &ModuleId) -> bool {
        self.module_progress
            .get(module_id)
            .is_some_and(|status| status.completed)
    }

    #[must_use]
    pub fn assessment_score(&self, assessment_id: &AssessmentId) -> Option<f64> {
        self.assessment_scores
            .iter()
            .find(|result| result.assessment_id == *assessment_id)
            .map(|result| result.score)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use serde_json::json;

    fn section(id: &str) -> SectionId {
        SectionId::new(id).unwrap()
    }

    fn module(id: &str) -> ModuleId {
        ModuleId::new(id).unwrap()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn toggles_drive_the_aggregate() {
        let mut state = ProgressState::with_known_modules();
        let now = fixed_now();

        state.apply_section_toggle(&section("basics-1"), &module("pm-basics"), true, now);
        assert!(approx(state.total_progress, 100.0 / 6.0));

        state.apply_section_toggle(&section("discovery-1"), &module("discovery"), true, now);
        assert!(approx(state.total_progress, 200.0 / 6.0));

        state.apply_section_toggle(&section("basics-1"), &module("pm-basics"), false, now);
        assert!(approx(state.total_progress, 100.0 / 6.0));
        assert_eq!(state.last_accessed_module, Some(module("pm-basics")));
    }

    #[test]
    fn toggle_is_idempotent() {
        let now = fixed_now();
        let mut once = ProgressState::empty();
        once.apply_section_toggle(&section("s1"), &module("metrics"), true, now);

        let mut twice = once.clone();
        twice.apply_section_toggle(&section("s1"), &module("metrics"), true, now);

        assert_eq!(once, twice);
        assert_eq!(twice.completed_sections.len(), 1);
    }

    #[test]
    fn unknown_module_is_created_on_demand_but_denominator_stays_six() {
        let mut state = ProgressState::empty();
        state.apply_section_toggle(&section("x"), &module("bonus"), true, fixed_now());

        assert!(state.is_module_completed(&module("bonus")));
        assert!(approx(state.total_progress, 100.0 / 6.0));
    }

    #[test]
    fn uncompleting_keeps_the_previous_completed_at() {
        let now = fixed_now();
        let later = now + chrono::Duration::hours(1);
        let mut state = ProgressState::with_known_modules();

        state.apply_section_toggle(&section("t1"), &module("tools"), true, now);
        state.apply_section_toggle(&section("t1"), &module("tools"), false, later);

        let status = &state.module_progress[&module("tools")];
        assert!(!status.completed);
        assert_eq!(status.completed_at, Some(now));
        assert!(!state.is_section_completed(&section("t1")));
    }

    #[test]
    fn assessment_upsert_keeps_one_entry() {
        let id = AssessmentId::new("rice-quiz").unwrap();
        let mut state = ProgressState::empty();
        assert_eq!(state.assessment_score(&id), None);

        state.upsert_assessment(&id, json!({"q1": "a"}), 60.0, fixed_now());
        state.upsert_assessment(&id, json!({"q1": "b"}), 80.0, fixed_now());

        assert_eq!(state.assessment_scores.len(), 1);
        assert_eq!(state.assessment_scores[0].answers, json!({"q1": "b"}));
        assert_eq!(state.assessment_score(&id), Some(80.0));
        assert!(approx(state.total_progress, 0.0));
    }

    #[test]
    fn normalized_recomputes_total_and_dedupes() {
        let raw = json!({
            "completed_sections": ["a", "b"],
            "module_progress": {
                "pm-basics": {"completed": true, "completed_at": "2023-11-14T22:13:20"},
                "discovery": {"completed": false, "completed_at": null}
            },
            "assessment_scores": [
                {"assessment_id": "q", "score": 10.0, "answers": {}, "completed_at": "2023-11-14 22:13:20"},
                {"assessment_id": "q", "score": 90.0, "answers": {}, "completed_at": "2023-11-14 22:13:20"}
            ],
            "total_progress": 42.0,
            "last_accessed_module": "pm-basics"
        });

        let state: ProgressState = serde_json::from_value(raw).unwrap();
        let state = state.normalized();

        assert!(approx(state.total_progress, 100.0 / 6.0));
        assert_eq!(state.assessment_scores.len(), 1);
        assert_eq!(state.assessment_score(&AssessmentId::new("q").unwrap()), Some(90.0));
        assert_eq!(
            state.module_progress[&module("pm-basics")].completed_at,
            Some(fixed_now())
        );
    }

    #[test]
    fn missing_fields_deserialize_to_empty_state() {
        let state: ProgressState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, ProgressState::empty());
    }

    #[test]
    fn snapshots_must_be_objects() {
        for raw in [json!([]), json!(null), json!("progress")] {
            assert!(ProgressState::from_snapshot(raw).is_err());
        }

        let state = ProgressState::from_snapshot(json!({
            "module_progress": {"metrics": {"completed": true}},
            "total_progress": 60.0
        }))
        .unwrap();
        assert!(approx(state.total_progress, 100.0 / 6.0));
    }

    #[test]
    fn blank_ids_in_a_snapshot_are_rejected() {
        let raw = json!({"completed_sections": ["   "]});
        assert!(ProgressState::from_snapshot(raw).is_err());

        let state = ProgressState::from_snapshot(json!({"completed_sections": [" intro "]})).unwrap();
        assert!(state.is_section_completed(&section("intro")));
    }

    #[test]
    fn default_snapshot_lists_known_modules() {
        let state = ProgressState::with_known_modules();
        assert_eq!(state.module_progress.len(), MODULE_COUNT);
        assert!(state.module_progress.values().all(|s| !s.completed));
        assert!(approx(state.total_progress, 0.0));
    }
}
