//! Weighted action selection with precondition filtering.

use std::sync::Arc;

use element_resolver::{ElementResolver, ResolveCtx};
use goal_tracker::GoalTracker;
use humanize::Entropy;
use meander_scenario::{Action, Conditions};
use tracing::{debug, trace};

/// State the condition checks read from.
pub struct ConditionEnv<'a> {
    pub tracker: &'a GoalTracker,
    pub resolver: &'a ElementResolver,
    pub ctx: ResolveCtx<'a>,
}

/// Picks one action from a page's configured pool.
pub struct ActionSelector {
    entropy: Arc<Entropy>,
}

impl ActionSelector {
    pub fn new(entropy: Arc<Entropy>) -> Self {
        Self { entropy }
    }

    /// Filter by weight and preconditions, then draw. `None` signals "no
    /// eligible action" to the run loop.
    pub async fn select<'a>(
        &self,
        candidates: &'a [&'a Action],
        env: &ConditionEnv<'_>,
    ) -> Option<&'a Action> {
        let eligible = self.eligible(candidates, env).await;
        let chosen = self.weighted_choice(&eligible);
        if let Some(action) = chosen {
            debug!(
                action = %action.name,
                eligible = eligible.len(),
                "action selected"
            );
        }
        chosen
    }

    /// Weight and precondition filtering, order preserved.
    pub async fn eligible<'a>(
        &self,
        candidates: &'a [&'a Action],
        env: &ConditionEnv<'_>,
    ) -> Vec<&'a Action> {
        let mut eligible = Vec::with_capacity(candidates.len());
        for action in candidates {
            if action.probability <= 0.0 {
                continue;
            }
            if conditions_met(&action.conditions, env).await {
                eligible.push(*action);
            } else {
                trace!(action = %action.name, "precondition failed");
            }
        }
        eligible
    }

    /// Weighted-random draw over relative weights: r is uniform in
    /// [0, sum); the walk subtracts each weight until r crosses zero.
    /// Floating-point fallthrough returns the last element, never `None`
    /// for a non-empty list.
    pub fn weighted_choice<'a>(&self, actions: &[&'a Action]) -> Option<&'a Action> {
        if actions.is_empty() {
            return None;
        }
        let total: f64 = actions.iter().map(|a| a.probability).sum();
        if total <= 0.0 {
            return None;
        }

        let mut r = self.entropy.range_f64(0.0, total);
        for action in actions {
            r -= action.probability;
            if r <= 0.0 {
                return Some(action);
            }
        }
        actions.last().copied()
    }
}

/// Evaluate one action's preconditions: time-on-page bounds, then required
/// element presence, then required absence, then per-metric progress
/// thresholds. The first failing check short-circuits.
async fn conditions_met(conditions: &Conditions, env: &ConditionEnv<'_>) -> bool {
    let time_on_page = env.tracker.time_on_current_page().as_millis() as u64;
    if let Some(min) = conditions.min_time_on_page {
        if time_on_page < min {
            return false;
        }
    }
    if let Some(max) = conditions.max_time_on_page {
        if time_on_page > max {
            return false;
        }
    }

    if let Some(selector) = &conditions.element_exists {
        if !env.resolver.exists(selector, env.ctx).await {
            return false;
        }
    }
    if let Some(selector) = &conditions.element_not_exists {
        if env.resolver.exists(selector, env.ctx).await {
            return false;
        }
    }

    for (metric, minimum) in &conditions.goal_progress {
        if env.tracker.metric(metric) < *minimum {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use meander_scenario::{Goals, SelectorSet};
    use page_adapter::fake::{FakeElement, FakePage};

    fn action(name: &str, probability: f64) -> Action {
        Action {
            name: name.to_string(),
            probability,
            conditions: Conditions::default(),
            impact: Default::default(),
            micro_sequence: Vec::new(),
            target_page: None,
        }
    }

    fn expected_index(seed: u64, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().sum();
        let mut r = Entropy::from_seed(seed).range_f64(0.0, total);
        for (i, w) in weights.iter().enumerate() {
            r -= w;
            if r <= 0.0 {
                return i;
            }
        }
        weights.len() - 1
    }

    #[test]
    fn weighted_choice_is_deterministic_with_seed() {
        let weights = [0.2, 0.5, 0.3];
        let actions: Vec<Action> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| action(&format!("a{i}"), *w))
            .collect();
        let refs: Vec<&Action> = actions.iter().collect();

        for seed in [1u64, 7, 42, 1000] {
            let selector = ActionSelector::new(Arc::new(Entropy::from_seed(seed)));
            let chosen = selector.weighted_choice(&refs).unwrap();
            let expected = expected_index(seed, &weights);
            assert_eq!(chosen.name, format!("a{expected}"), "seed {seed}");
        }
    }

    #[test]
    fn empty_set_returns_none() {
        let selector = ActionSelector::new(Arc::new(Entropy::from_seed(1)));
        assert!(selector.weighted_choice(&[]).is_none());
    }

    #[test]
    fn weights_are_relative_not_normalized() {
        // Sum far above 1; the draw still lands on some element.
        let actions = [action("a", 0.9), action("b", 0.9), action("c", 0.9)];
        let refs: Vec<&Action> = actions.iter().collect();
        let selector = ActionSelector::new(Arc::new(Entropy::from_seed(3)));
        assert!(selector.weighted_choice(&refs).is_some());
    }

    #[tokio::test]
    async fn zero_weight_actions_are_filtered() {
        let page = FakePage::new();
        let entropy = Arc::new(Entropy::from_seed(1));
        let resolver = ElementResolver::new(page, entropy.clone());
        let tracker = GoalTracker::new(Goals::default());
        let set = SelectorSet::default();
        let env = ConditionEnv {
            tracker: &tracker,
            resolver: &resolver,
            ctx: ResolveCtx::new(&set, None),
        };

        let actions = [action("dead", 0.0), action("live", 0.4)];
        let refs: Vec<&Action> = actions.iter().collect();
        let selector = ActionSelector::new(entropy);
        let eligible = selector.eligible(&refs, &env).await;
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].name, "live");
    }

    #[tokio::test]
    async fn element_exists_condition_filters_absent_selector() {
        let page = FakePage::new();
        let entropy = Arc::new(Entropy::from_seed(1));
        let resolver = ElementResolver::new(page.clone(), entropy.clone());
        let tracker = GoalTracker::new(Goals::default());
        let set = SelectorSet::default();
        let env = ConditionEnv {
            tracker: &tracker,
            resolver: &resolver,
            ctx: ResolveCtx::new(&set, None),
        };

        let mut gated = action("gated", 1.0);
        gated.conditions.element_exists = Some("#promo".to_string());
        let actions = [gated];
        let refs: Vec<&Action> = actions.iter().collect();

        let selector = ActionSelector::new(entropy);
        assert!(selector.select(&refs, &env).await.is_none());

        page.insert("promo", FakeElement::new("div").matching("#promo"));
        assert!(selector.select(&refs, &env).await.is_some());
    }

    #[tokio::test]
    async fn element_not_exists_condition() {
        let page = FakePage::new();
        page.insert("banner", FakeElement::new("div").matching("#banner"));
        let entropy = Arc::new(Entropy::from_seed(1));
        let resolver = ElementResolver::new(page.clone(), entropy.clone());
        let tracker = GoalTracker::new(Goals::default());
        let set = SelectorSet::default();
        let env = ConditionEnv {
            tracker: &tracker,
            resolver: &resolver,
            ctx: ResolveCtx::new(&set, None),
        };

        let mut gated = action("gated", 1.0);
        gated.conditions.element_not_exists = Some("#banner".to_string());
        let actions = [gated];
        let refs: Vec<&Action> = actions.iter().collect();

        let selector = ActionSelector::new(entropy);
        assert!(selector.select(&refs, &env).await.is_none());

        page.remove("banner");
        assert!(selector.select(&refs, &env).await.is_some());
    }

    #[tokio::test]
    async fn goal_progress_threshold_gates_eligibility() {
        let page = FakePage::new();
        let entropy = Arc::new(Entropy::from_seed(1));
        let resolver = ElementResolver::new(page, entropy.clone());
        let tracker = GoalTracker::new(Goals::default());
        let set = SelectorSet::default();
        let env = ConditionEnv {
            tracker: &tracker,
            resolver: &resolver,
            ctx: ResolveCtx::new(&set, None),
        };

        let mut gated = action("checkout", 1.0);
        gated
            .conditions
            .goal_progress
            .insert("items".into(), 2.0);
        let actions = [gated];
        let refs: Vec<&Action> = actions.iter().collect();
        let selector = ActionSelector::new(entropy);

        assert!(selector.select(&refs, &env).await.is_none());

        tracker.update_metrics(&[("items".into(), 2.0)].into_iter().collect());
        assert!(selector.select(&refs, &env).await.is_some());
    }

    #[tokio::test]
    async fn time_on_page_bounds() {
        let page = FakePage::new();
        let entropy = Arc::new(Entropy::from_seed(1));
        let resolver = ElementResolver::new(page, entropy.clone());
        let tracker = GoalTracker::new(Goals::default());
        tracker.update_current_page("home".into());
        let set = SelectorSet::default();
        let env = ConditionEnv {
            tracker: &tracker,
            resolver: &resolver,
            ctx: ResolveCtx::new(&set, None),
        };

        let mut early = action("early", 1.0);
        early.conditions.max_time_on_page = Some(60_000);
        let mut late = action("late", 1.0);
        late.conditions.min_time_on_page = Some(60_000);
        let actions = [early, late];
        let refs: Vec<&Action> = actions.iter().collect();

        let selector = ActionSelector::new(entropy);
        let eligible = selector.eligible(&refs, &env).await;
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].name, "early");
    }
}
