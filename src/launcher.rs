use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{error, warn};

use crate::errors::RecorderError;
use crate::selection::Checklist;

/// Base name for recorder output, before any per-group suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    pub stem: String,
    pub extension: String,
}

impl OutputName {
    /// A user-supplied name, reused verbatim.
    pub fn explicit(name: impl Into<String>) -> Self {
        Self {
            stem: name.into(),
            extension: String::new(),
        }
    }

    pub fn resolve(&self, suffix_index: Option<u32>) -> String {
        match suffix_index {
            Some(index) => format!("{}-{index}{}", self.stem, self.extension),
            None => format!("{}{}", self.stem, self.extension),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchGroup {
    pub index: u32,
    pub topics: Vec<String>,
    pub output_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchPlan {
    pub groups: Vec<LaunchGroup>,
}

/// Starts and stops one recorder per launch group.
pub trait Recorder {
    type Handle;

    fn start(&mut self, group: &LaunchGroup) -> Result<Self::Handle>;

    async fn stop(&mut self, handle: Self::Handle) -> Result<()>;
}

/// Source of user interrupts, checked between recorder starts.
pub trait Interrupt {
    /// `true` when an interrupt arrived since the last check. Never waits.
    async fn take_pending(&mut self) -> bool;
}

/// Groups the checked topics by process index. Names only get a `-{index}`
/// suffix when more than one group is launched.
pub fn plan(checklist: &Checklist, output: &OutputName) -> LaunchPlan {
    let mut grouped = BTreeMap::<u32, Vec<String>>::new();
    for entry in checklist.entries().iter().filter(|entry| entry.checked) {
        if let Some(index) = entry.process_index {
            grouped.entry(index).or_default().push(entry.topic.clone());
        }
    }

    let multiple = grouped.len() > 1;
    let groups = grouped
        .into_iter()
        .map(|(index, topics)| LaunchGroup {
            index,
            topics,
            output_name: output.resolve(multiple.then_some(index)),
        })
        .collect();

    LaunchPlan { groups }
}

/// Starts every group in index order. If one fails, or the user interrupts
/// before the last one is up, the groups that already started are stopped
/// before the error is returned.
pub async fn launch<R: Recorder, I: Interrupt>(
    recorder: &mut R,
    plan: &LaunchPlan,
    interrupt: &mut I,
) -> Result<Vec<R::Handle>, RecorderError> {
    let mut started = Vec::with_capacity(plan.groups.len());

    for group in &plan.groups {
        if interrupt.take_pending().await {
            warn!(
                "interrupted before process {} started, stopping {} recorder(s)",
                group.index,
                started.len()
            );
            roll_back(recorder, started).await;
            return Err(RecorderError::LaunchInterrupted);
        }

        match recorder.start(group) {
            Ok(handle) => started.push(handle),
            Err(err) => {
                error!("recorder for process {} failed: {err:#}", group.index);
                roll_back(recorder, started).await;
                return Err(RecorderError::Launch {
                    index: group.index,
                    message: format!("{err:#}"),
                });
            }
        }
    }

    Ok(started)
}

async fn roll_back<R: Recorder>(recorder: &mut R, started: Vec<R::Handle>) {
    for handle in started.into_iter().rev() {
        if let Err(err) = recorder.stop(handle).await {
            warn!("failed to stop recorder during rollback: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::Result;

    use super::{launch, plan, Interrupt, LaunchGroup, LaunchPlan, OutputName, Recorder};
    use crate::errors::RecorderError;
    use crate::selection::{Checklist, Direction, PersistedSelection};

    #[derive(Default)]
    struct FakeRecorder {
        fail_on: Option<u32>,
        started: Vec<String>,
        stopped: Vec<u32>,
    }

    impl Recorder for FakeRecorder {
        type Handle = u32;

        fn start(&mut self, group: &LaunchGroup) -> Result<u32> {
            if self.fail_on == Some(group.index) {
                anyhow::bail!("rosbag not found");
            }
            self.started.push(group.output_name.clone());
            Ok(group.index)
        }

        async fn stop(&mut self, handle: u32) -> Result<()> {
            self.stopped.push(handle);
            Ok(())
        }
    }

    /// Reports an interrupt on the given check (0-based), never otherwise.
    #[derive(Default)]
    struct FakeInterrupt {
        fire_on_check: Option<usize>,
        checks: usize,
    }

    impl Interrupt for FakeInterrupt {
        async fn take_pending(&mut self) -> bool {
            let fire = self.fire_on_check == Some(self.checks);
            self.checks += 1;
            fire
        }
    }

    #[test]
    fn scenario_selection_produces_two_groups() {
        let mut checklist = checklist(&["/a", "/b", "/c", "/d"]);
        checklist.toggle(0);
        checklist.toggle(2);
        checklist.toggle(1);
        checklist.shift_index(1, Direction::Left);

        let launch_plan = plan(&checklist, &OutputName::explicit("run"));

        let mut expected = BTreeMap::new();
        expected.insert(1, vec!["/a", "/b"]);
        expected.insert(2, vec!["/c"]);
        assert_eq!(topics_by_index(&launch_plan), expected);
    }

    #[test]
    fn two_groups_differ_only_by_suffix() {
        let mut checklist = checklist(&["/a", "/b", "/c"]);
        checklist.toggle(0);
        checklist.toggle(1);
        checklist.toggle(2);
        checklist.shift_index(1, Direction::Left);
        let output = OutputName {
            stem: "2024-03-09-07-05-01".to_string(),
            extension: ".bag".to_string(),
        };

        let launch_plan = plan(&checklist, &output);

        let names: Vec<_> = launch_plan
            .groups
            .iter()
            .map(|group| group.output_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["2024-03-09-07-05-01-1.bag", "2024-03-09-07-05-01-2.bag"]
        );
    }

    #[test]
    fn single_group_keeps_base_name() {
        let mut checklist = checklist(&["/a", "/b"]);
        checklist.toggle(0);
        checklist.toggle(1);
        checklist.shift_index(1, Direction::Left);

        let explicit = plan(&checklist, &OutputName::explicit("field_test"));
        assert_eq!(explicit.groups.len(), 1);
        assert_eq!(explicit.groups[0].output_name, "field_test");

        let generated = plan(
            &checklist,
            &OutputName {
                stem: "rosbag2_2024_03_09-07_05_01".to_string(),
                extension: String::new(),
            },
        );
        assert_eq!(generated.groups[0].output_name, "rosbag2_2024_03_09-07_05_01");
    }

    #[test]
    fn plan_is_empty_without_checked_topics() {
        let checklist = checklist(&["/a"]);
        assert!(plan(&checklist, &OutputName::explicit("x")).groups.is_empty());
    }

    #[tokio::test]
    async fn launch_starts_every_group_in_index_order() {
        let mut recorder = FakeRecorder::default();
        let launch_plan = fixture_plan(3);

        let handles = launch(&mut recorder, &launch_plan, &mut FakeInterrupt::default())
            .await
            .expect("expected launch success");

        assert_eq!(handles, vec![1, 2, 3]);
        assert_eq!(recorder.started, vec!["run-1", "run-2", "run-3"]);
        assert!(recorder.stopped.is_empty());
    }

    #[tokio::test]
    async fn launch_failure_stops_already_started_groups() {
        let mut recorder = FakeRecorder {
            fail_on: Some(3),
            ..FakeRecorder::default()
        };
        let launch_plan = fixture_plan(3);

        let err = launch(&mut recorder, &launch_plan, &mut FakeInterrupt::default())
            .await
            .expect_err("expected launch failure");

        match err {
            RecorderError::Launch { index, message } => {
                assert_eq!(index, 3);
                assert!(message.contains("rosbag not found"), "got {message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(recorder.stopped, vec![2, 1]);
    }

    #[tokio::test]
    async fn launch_failure_on_first_group_stops_nothing() {
        let mut recorder = FakeRecorder {
            fail_on: Some(1),
            ..FakeRecorder::default()
        };

        let err = launch(&mut recorder, &fixture_plan(2), &mut FakeInterrupt::default())
            .await
            .expect_err("expected launch failure");

        assert!(err.to_string().contains("process 1"), "got {err}");
        assert!(recorder.started.is_empty());
        assert!(recorder.stopped.is_empty());
    }

    #[tokio::test]
    async fn interrupt_during_launch_stops_started_groups() {
        let mut recorder = FakeRecorder::default();
        let mut interrupt = FakeInterrupt {
            fire_on_check: Some(2),
            ..FakeInterrupt::default()
        };

        let err = launch(&mut recorder, &fixture_plan(3), &mut interrupt)
            .await
            .expect_err("expected launch to be interrupted");

        assert!(matches!(err, RecorderError::LaunchInterrupted), "got {err:?}");
        assert_eq!(recorder.started, vec!["run-1", "run-2"]);
        assert_eq!(recorder.stopped, vec![2, 1]);
    }

    #[tokio::test]
    async fn interrupt_before_first_start_launches_nothing() {
        let mut recorder = FakeRecorder::default();
        let mut interrupt = FakeInterrupt {
            fire_on_check: Some(0),
            ..FakeInterrupt::default()
        };

        let err = launch(&mut recorder, &fixture_plan(2), &mut interrupt)
            .await
            .expect_err("expected launch to be interrupted");

        assert!(matches!(err, RecorderError::LaunchInterrupted));
        assert!(recorder.started.is_empty());
        assert!(recorder.stopped.is_empty());
    }

    fn topics_by_index(plan: &LaunchPlan) -> BTreeMap<u32, Vec<&str>> {
        plan.groups
            .iter()
            .map(|group| {
                (
                    group.index,
                    group.topics.iter().map(String::as_str).collect(),
                )
            })
            .collect()
    }

    fn checklist(topics: &[&str]) -> Checklist {
        let catalog: Vec<String> = topics.iter().map(|topic| topic.to_string()).collect();
        Checklist::restore(&catalog, &PersistedSelection::new())
    }

    fn fixture_plan(groups: u32) -> LaunchPlan {
        LaunchPlan {
            groups: (1..=groups)
                .map(|index| LaunchGroup {
                    index,
                    topics: vec![format!("/topic_{index}")],
                    output_name: format!("run-{index}"),
                })
                .collect(),
        }
    }
}
