use std::{fs, path::Path, str::FromStr};

use anyhow::{anyhow, bail, Context, Error, Result};
use tile_rpg_core::GridCoordinate;

/// One scripted input of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScriptStep {
    /// Touch the coordinate, written `touch:C,R`.
    Touch(GridCoordinate),
    /// Press the action button, written `action`.
    Action,
    /// Advance the simulation, written `tick` or `tick:N`.
    Tick(u32),
}

impl FromStr for ScriptStep {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        let (verb, argument) = match value.split_once(':') {
            Some((verb, argument)) => (verb, Some(argument.trim())),
            None => (value, None),
        };

        match (verb, argument) {
            ("action", None) => Ok(Self::Action),
            ("tick", None) => Ok(Self::Tick(1)),
            ("tick", Some(count)) => count
                .parse()
                .map(Self::Tick)
                .with_context(|| format!("invalid tick count `{count}`")),
            ("touch", Some(position)) => {
                let (column, row) = position
                    .split_once(',')
                    .ok_or_else(|| anyhow!("touch expects `column,row`, found `{position}`"))?;
                let column = column
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid column `{column}`"))?;
                let row = row
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid row `{row}`"))?;
                Ok(Self::Touch(GridCoordinate::new(column, row)))
            }
            _ => bail!("unknown script step `{value}`"),
        }
    }
}

/// Reads a script file: one step per line, `#` starts a comment.
pub(crate) fn read_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read script at {}", path.display()))?;
    parse_script(&contents).with_context(|| format!("invalid script at {}", path.display()))
}

fn parse_script(contents: &str) -> Result<Vec<ScriptStep>> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.split('#').next().unwrap_or_default().trim();
            (!line.is_empty()).then_some((index + 1, line))
        })
        .map(|(number, line)| {
            line.parse()
                .with_context(|| format!("line {number}: `{line}`"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_step_form() {
        assert_eq!(
            "touch:3, 4".parse::<ScriptStep>().expect("touch"),
            ScriptStep::Touch(GridCoordinate::new(3, 4))
        );
        assert_eq!("action".parse::<ScriptStep>().expect("action"), ScriptStep::Action);
        assert_eq!("tick".parse::<ScriptStep>().expect("tick"), ScriptStep::Tick(1));
        assert_eq!("tick:12".parse::<ScriptStep>().expect("ticks"), ScriptStep::Tick(12));
    }

    #[test]
    fn rejects_malformed_steps() {
        assert!("touch:3".parse::<ScriptStep>().is_err());
        assert!("touch:-1,2".parse::<ScriptStep>().is_err());
        assert!("jump".parse::<ScriptStep>().is_err());
        assert!("action:now".parse::<ScriptStep>().is_err());
    }

    #[test]
    fn script_files_skip_comments_and_blank_lines() {
        let script = "# greet the elder\ntouch:2,2\n\naction # talk\ntick:3\n";
        assert_eq!(
            parse_script(script).expect("valid script"),
            vec![
                ScriptStep::Touch(GridCoordinate::new(2, 2)),
                ScriptStep::Action,
                ScriptStep::Tick(3),
            ]
        );

        let error = parse_script("action\nwave\n").expect_err("unknown step");
        assert!(format!("{error:#}").contains("line 2"));
    }
}
