use clap::Parser;

const BUILD_VERSION: &str = env!("RECORD_BAG_BUILD_VERSION");
const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
USAGE:
  {usage}

ARGUMENTS:
{positionals}

OPTIONS:
{options}
{after-help}
";
const HELP_AFTER: &str = "\
Keys
  ↑/↓ (k/j)      move
  space          check or uncheck topic
  ←/→ (h/l)      move checked topic to previous/next process
  enter          save selection and start recording
  ctrl+c         quit without recording

  Processes are numbered top to bottom by their first checked topic, so
  moving a group's first topic can renumber the groups below it.

Environment
  ROS_VERSION                 2 selects ROS 2, anything else ROS 1
  BAG_RECORDER_HOME           where selections are remembered
  BAG_RECORDER_EXCLUDE        comma-separated topics hidden from the list
  BAG_RECORDER_STOP_TIMEOUT   seconds per shutdown step (default 5)

Examples
  record-bag
  record-bag -O field_test
  ROS_VERSION=2 record-bag -o drive --storage mcap
";

#[derive(Debug, Parser)]
#[command(
    name = "record-bag",
    version = BUILD_VERSION,
    about = "Pick ROS topics interactively and record them into one or more bags",
    help_template = HELP_TEMPLATE,
    after_help = HELP_AFTER
)]
pub struct Cli {
    /// Arguments forwarded to every `rosbag record` / `ros2 bag record` process.
    #[arg(
        value_name = "RECORDER_ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub recorder_args: Vec<String>,
}
