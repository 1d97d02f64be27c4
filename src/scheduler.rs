use super::*;

pub(crate) type TaskCallback = Box<dyn FnOnce(&mut Page) -> Result<()>>;

/// Cancellable handle to a task scheduled with [`Page::schedule_after`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(i64);

impl TimerHandle {
    pub fn id(&self) -> i64 {
        self.0
    }
}

pub(crate) struct ScheduledTask {
    pub(crate) id: i64,
    pub(crate) due_at: i64,
    pub(crate) order: i64,
    pub(crate) label: String,
    pub(crate) callback: TaskCallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: i64,
    pub due_at: i64,
    pub order: i64,
    pub label: String,
}

pub(crate) struct SchedulerState {
    pub(crate) task_queue: Vec<ScheduledTask>,
    pub(crate) microtask_queue: VecDeque<TaskCallback>,
    pub(crate) now_ms: i64,
    pub(crate) timer_step_limit: usize,
    pub(crate) next_timer_id: i64,
    pub(crate) next_task_order: i64,
    pub(crate) task_depth: usize,
}

impl SchedulerState {
    pub(crate) fn new(timer_step_limit: usize) -> Self {
        Self {
            task_queue: Vec::new(),
            microtask_queue: VecDeque::new(),
            now_ms: 0,
            timer_step_limit,
            next_timer_id: 1,
            next_task_order: 0,
            task_depth: 0,
        }
    }

    pub(crate) fn allocate_timer_id(&mut self) -> i64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        id
    }

    pub(crate) fn allocate_task_order(&mut self) -> i64 {
        let order = self.next_task_order;
        self.next_task_order += 1;
        order
    }
}

impl fmt::Debug for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerState")
            .field("pending_tasks", &self.task_queue.len())
            .field("pending_microtasks", &self.microtask_queue.len())
            .field("now_ms", &self.now_ms)
            .field("timer_step_limit", &self.timer_step_limit)
            .finish_non_exhaustive()
    }
}

impl Page {
    /// Runs `action` once the virtual clock has advanced by `delay_ms`.
    ///
    /// Negative delays are clamped to zero. The returned handle cancels the
    /// task through [`Page::cancel_timer`] as long as it has not started.
    pub fn schedule_after<F>(&mut self, delay_ms: i64, label: &str, action: F) -> TimerHandle
    where
        F: FnOnce(&mut Page) -> Result<()> + 'static,
    {
        let id = self.scheduler.allocate_timer_id();
        let order = self.scheduler.allocate_task_order();
        let due_at = self.scheduler.now_ms.saturating_add(delay_ms.max(0));
        self.scheduler.task_queue.push(ScheduledTask {
            id,
            due_at,
            order,
            label: label.to_string(),
            callback: Box::new(action),
        });
        self.trace_timer_line(format!(
            "[timer] schedule id={id} label={label} due_at={due_at} delay_ms={delay_ms}"
        ));
        TimerHandle(id)
    }

    /// Cancels a pending task. Returns false when it already ran or was canceled.
    pub fn cancel_timer(&mut self, handle: TimerHandle) -> bool {
        self.clear_timer(handle.0)
    }

    pub fn clear_timer(&mut self, timer_id: i64) -> bool {
        let existed = self.discard_tasks(|task| task.id == timer_id) > 0;
        self.trace_timer_line(format!("[timer] clear id={timer_id} existed={existed}"));
        existed
    }

    /// Drops every pending task. A fetch waiting on mock latency is dropped
    /// with it: its callback never runs and it stops counting as pending.
    pub fn clear_all_timers(&mut self) -> usize {
        let cleared = self.discard_tasks(|_| true);
        self.trace_timer_line(format!("[timer] clear_all cleared={cleared}"));
        cleared
    }

    fn discard_tasks(&mut self, mut discard: impl FnMut(&ScheduledTask) -> bool) -> usize {
        let before = self.scheduler.task_queue.len();
        let mut dropped_fetches = 0usize;
        self.scheduler.task_queue.retain(|task| {
            let dropped = discard(task);
            if dropped && task.label == FETCH_TASK_LABEL {
                dropped_fetches += 1;
            }
            !dropped
        });
        self.platform.in_flight_fetches = self
            .platform
            .in_flight_fetches
            .saturating_sub(dropped_fetches);
        before - self.scheduler.task_queue.len()
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        let mut timers = self
            .scheduler
            .task_queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
                label: task.label.clone(),
            })
            .collect::<Vec<_>>();
        timers.sort_by_key(|timer| (timer.due_at, timer.order));
        timers
    }

    pub fn now_ms(&self) -> i64 {
        self.scheduler.now_ms
    }

    pub fn set_timer_step_limit(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(Error::Runtime(
                "set_timer_step_limit requires at least 1 step".into(),
            ));
        }
        self.scheduler.timer_step_limit = max_steps;
        Ok(())
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Runtime(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let from = self.scheduler.now_ms;
        let target = from.saturating_add(delta_ms);
        let ran = self.run_timer_queue(Some(target), true)?;
        self.scheduler.now_ms = target;
        self.trace_timer_line(format!(
            "[timer] advance delta_ms={delta_ms} from={from} to={target} ran_due={ran}"
        ));
        Ok(())
    }

    pub fn advance_time_to(&mut self, target_ms: i64) -> Result<()> {
        if target_ms < self.scheduler.now_ms {
            return Err(Error::Runtime(format!(
                "advance_time_to requires target >= now_ms (target={target_ms}, now_ms={})",
                self.scheduler.now_ms
            )));
        }
        let from = self.scheduler.now_ms;
        let ran = self.run_timer_queue(Some(target_ms), true)?;
        self.scheduler.now_ms = target_ms;
        self.trace_timer_line(format!(
            "[timer] advance_to from={from} to={target_ms} ran_due={ran}"
        ));
        Ok(())
    }

    /// Runs every pending task, moving the clock to each task's due time.
    pub fn flush(&mut self) -> Result<()> {
        let from = self.scheduler.now_ms;
        let ran = self.run_timer_queue(None, true)?;
        self.trace_timer_line(format!(
            "[timer] flush from={from} to={} ran={ran}",
            self.scheduler.now_ms
        ));
        Ok(())
    }

    pub fn run_next_timer(&mut self) -> Result<bool> {
        let Some(next_idx) = self.next_task_index(None) else {
            self.trace_timer_line("[timer] run_next none".into());
            return Ok(false);
        };

        let task = self.scheduler.task_queue.remove(next_idx);
        if task.due_at > self.scheduler.now_ms {
            self.scheduler.now_ms = task.due_at;
        }
        self.execute_timer_task(task)?;
        Ok(true)
    }

    pub fn run_due_timers(&mut self) -> Result<usize> {
        let ran = self.run_timer_queue(Some(self.scheduler.now_ms), false)?;
        self.trace_timer_line(format!(
            "[timer] run_due now_ms={} ran={ran}",
            self.scheduler.now_ms
        ));
        Ok(ran)
    }

    /// Tasks scheduled while the queue runs are picked up in the same pass
    /// when they fall within `due_limit`.
    fn run_timer_queue(&mut self, due_limit: Option<i64>, advance_clock: bool) -> Result<usize> {
        let mut steps = 0usize;
        while let Some(next_idx) = self.next_task_index(due_limit) {
            steps += 1;
            if steps > self.scheduler.timer_step_limit {
                return Err(self.timer_step_limit_error(steps, due_limit));
            }
            let task = self.scheduler.task_queue.remove(next_idx);
            if advance_clock && task.due_at > self.scheduler.now_ms {
                self.scheduler.now_ms = task.due_at;
            }
            self.execute_timer_task(task)?;
        }
        Ok(steps)
    }

    fn timer_step_limit_error(&self, steps: usize, due_limit: Option<i64>) -> Error {
        let due_limit_desc = due_limit
            .map(|value| value.to_string())
            .unwrap_or_else(|| "none".into());

        let next_task_desc = self
            .next_task_index(due_limit)
            .and_then(|idx| self.scheduler.task_queue.get(idx))
            .map(|task| {
                format!(
                    "id={},label={},due_at={},order={}",
                    task.id, task.label, task.due_at, task.order
                )
            })
            .unwrap_or_else(|| "none".into());

        Error::Runtime(format!(
            "flush exceeded max task steps (possible runaway rescheduling): limit={}, steps={steps}, now_ms={}, due_limit={due_limit_desc}, pending_tasks={}, next_task={next_task_desc}",
            self.scheduler.timer_step_limit,
            self.scheduler.now_ms,
            self.scheduler.task_queue.len(),
        ))
    }

    fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.scheduler
            .task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.is_none_or(|limit| task.due_at <= limit))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }

    fn execute_timer_task(&mut self, task: ScheduledTask) -> Result<()> {
        self.trace_timer_line(format!(
            "[timer] run id={} label={} due_at={} now_ms={}",
            task.id, task.label, task.due_at, self.scheduler.now_ms
        ));
        let callback = task.callback;
        self.run_in_task_context(callback)
    }

    pub(crate) fn queue_microtask<F>(&mut self, task: F)
    where
        F: FnOnce(&mut Page) -> Result<()> + 'static,
    {
        self.scheduler.microtask_queue.push_back(Box::new(task));
    }

    /// Runs `f` as a task; the microtask checkpoint runs when the outermost
    /// task returns.
    pub(crate) fn run_in_task_context<R>(
        &mut self,
        f: impl FnOnce(&mut Page) -> Result<R>,
    ) -> Result<R> {
        self.scheduler.task_depth += 1;
        let result = f(self);
        self.scheduler.task_depth -= 1;
        let value = result?;
        if self.scheduler.task_depth == 0 {
            self.run_microtasks()?;
        }
        Ok(value)
    }

    pub(crate) fn run_microtasks(&mut self) -> Result<usize> {
        let mut steps = 0usize;
        while let Some(task) = self.scheduler.microtask_queue.pop_front() {
            steps += 1;
            if steps > self.scheduler.timer_step_limit {
                return Err(Error::Runtime(format!(
                    "microtask checkpoint exceeded max steps: limit={}, pending={}",
                    self.scheduler.timer_step_limit,
                    self.scheduler.microtask_queue.len()
                )));
            }
            self.scheduler.task_depth += 1;
            let result = task(self);
            self.scheduler.task_depth -= 1;
            result?;
        }
        Ok(steps)
    }
}
