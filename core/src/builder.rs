//! Fluent builder for retry triggers.
//!
//! [`RetryScheduleBuilder`] is the factory boundary between a host scheduler and
//! the retry trigger variants. It never constructs a trigger type by itself:
//! the caller supplies a factory function, and `build` runs three steps in order:
//!
//! 1. the factory creates the trigger from its [`TriggerMeta`];
//! 2. the built-in defaults are applied ([`RetryTrigger::apply_default_settings`]);
//! 3. the optional settings override runs, then the misfire instruction is set.

use std::fmt;
use std::sync::Arc;

use crate::trigger::{MisfireInstruction, RetryTrigger, TriggerMeta};

/// Creates a trigger from its metadata.
pub type TriggerFactory<T> = Arc<dyn Fn(TriggerMeta) -> T + Send + Sync>;

/// Adjusts the settings of a freshly built trigger.
pub type ApplySettings<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// Builder for configuring retry triggers.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeDelta, Utc};
/// use retry_trigger::{
///     ExpBackoffRetryTrigger, MisfireInstruction, RetryPolicy, RetryScheduleBuilder,
///     RetryTrigger, Trigger, TriggerKey, TriggerMeta,
/// };
///
/// let policy = RetryPolicy::new().backoff_base_interval(TimeDelta::seconds(30));
/// let builder = RetryScheduleBuilder::create(ExpBackoffRetryTrigger::from_meta)
///     .with_apply_settings(move |trigger: &mut ExpBackoffRetryTrigger| {
///         trigger.set_retry_policy(policy)
///     })
///     .with_misfire_handling_instruction_ignore_misfires();
///
/// let meta = TriggerMeta::new(TriggerKey::in_default_group("import#RETRY"), Utc::now());
/// let trigger = builder.build(meta);
///
/// assert_eq!(trigger.retry_policy().backoff_base_interval, TimeDelta::seconds(30));
/// assert_eq!(trigger.meta().misfire_instruction, MisfireInstruction::IgnoreMisfirePolicy);
/// ```
pub struct RetryScheduleBuilder<T> {
    factory: TriggerFactory<T>,
    apply_settings: Option<ApplySettings<T>>,
    misfire_instruction: MisfireInstruction,
}

impl<T: RetryTrigger> RetryScheduleBuilder<T> {
    /// Start a builder around `factory`.
    pub fn create<F>(factory: F) -> Self
    where
        F: Fn(TriggerMeta) -> T + Send + Sync + 'static,
    {
        Self::from_factory(Arc::new(factory))
    }

    /// Start a builder around an already shared factory.
    pub fn from_factory(factory: TriggerFactory<T>) -> Self {
        Self {
            factory,
            apply_settings: None,
            misfire_instruction: MisfireInstruction::SmartPolicy,
        }
    }

    /// Set the settings override, replacing any earlier one.
    pub fn with_apply_settings<F>(self, apply_settings: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.with_shared_apply_settings(Arc::new(apply_settings))
    }

    /// Set an already shared settings override.
    pub fn with_shared_apply_settings(mut self, apply_settings: ApplySettings<T>) -> Self {
        self.apply_settings = Some(apply_settings);
        self
    }

    /// If the trigger misfires, use [`MisfireInstruction::IgnoreMisfirePolicy`].
    pub fn with_misfire_handling_instruction_ignore_misfires(self) -> Self {
        self.with_misfire_instruction(MisfireInstruction::IgnoreMisfirePolicy)
    }

    pub fn with_misfire_instruction(mut self, misfire_instruction: MisfireInstruction) -> Self {
        self.misfire_instruction = misfire_instruction;
        self
    }

    pub fn misfire_instruction(&self) -> MisfireInstruction {
        self.misfire_instruction
    }

    /// Build a trigger for `meta`.
    ///
    /// The builder can be reused; every call produces an independent trigger.
    pub fn build(&self, meta: TriggerMeta) -> T {
        let mut trigger = (self.factory)(meta);
        trigger.apply_default_settings();
        if let Some(apply_settings) = &self.apply_settings {
            apply_settings(&mut trigger);
        }
        trigger.meta_mut().misfire_instruction = self.misfire_instruction;
        trigger
    }
}

impl<T> Clone for RetryScheduleBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            apply_settings: self.apply_settings.clone(),
            misfire_instruction: self.misfire_instruction,
        }
    }
}

impl<T> fmt::Debug for RetryScheduleBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryScheduleBuilder")
            .field("apply_settings", &self.apply_settings.is_some())
            .field("misfire_instruction", &self.misfire_instruction)
            .finish()
    }
}
