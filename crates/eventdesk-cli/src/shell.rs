//! Interactive menu over the same actions the subcommands expose.

use std::io;

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use eventdesk_core::{EventState, parse_date};
use tracing::info;

use crate::app::App;
use crate::cli_args::{
    Action, AddArgs, DependArgs, NameArgs, NotifyArgs, ParticipantArgs, RateArgs,
    RateInstructorArgs, SetStateArgs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    AddEvent,
    ViewNext,
    ExecuteNext,
    AddDependency,
    CheckCycles,
    AddParticipant,
    RemoveParticipant,
    SearchEvent,
    RemoveEvent,
    Notify,
    Categorize,
    Overlaps,
    Status,
    UpdateState,
    RateEvent,
    RateInstructor,
    RankInstructors,
    SaveAndExit,
    Quit,
}

const MENU: [MenuItem; 19] = [
    MenuItem::AddEvent,
    MenuItem::ViewNext,
    MenuItem::ExecuteNext,
    MenuItem::AddDependency,
    MenuItem::CheckCycles,
    MenuItem::AddParticipant,
    MenuItem::RemoveParticipant,
    MenuItem::SearchEvent,
    MenuItem::RemoveEvent,
    MenuItem::Notify,
    MenuItem::Categorize,
    MenuItem::Overlaps,
    MenuItem::Status,
    MenuItem::UpdateState,
    MenuItem::RateEvent,
    MenuItem::RateInstructor,
    MenuItem::RankInstructors,
    MenuItem::SaveAndExit,
    MenuItem::Quit,
];

impl MenuItem {
    fn label(self) -> &'static str {
        match self {
            MenuItem::AddEvent => "Add event",
            MenuItem::ViewNext => "View next event",
            MenuItem::ExecuteNext => "Execute next event",
            MenuItem::AddDependency => "Add dependency",
            MenuItem::CheckCycles => "Check for dependency cycles",
            MenuItem::AddParticipant => "Add participant",
            MenuItem::RemoveParticipant => "Remove participant",
            MenuItem::SearchEvent => "Search event",
            MenuItem::RemoveEvent => "Remove event",
            MenuItem::Notify => "Notify participants",
            MenuItem::Categorize => "Categorize events",
            MenuItem::Overlaps => "Detect overlapping events",
            MenuItem::Status => "Show event status",
            MenuItem::UpdateState => "Update event state",
            MenuItem::RateEvent => "Rate event",
            MenuItem::RateInstructor => "Rate instructor",
            MenuItem::RankInstructors => "Rank instructors",
            MenuItem::SaveAndExit => "Save and exit",
            MenuItem::Quit => "Exit without saving",
        }
    }
}

/// Runs the menu loop until the user exits. Action errors are printed and the menu comes back.
pub fn run_shell(app: &mut App) -> Result<()> {
    let theme = ColorfulTheme::default();
    let labels: Vec<&str> = MENU.iter().map(|item| item.label()).collect();
    let mut stdout = io::stdout();

    loop {
        let selection = Select::with_theme(&theme)
            .with_prompt("Event Management System")
            .items(&labels)
            .default(0)
            .interact()?;

        let action = match MENU[selection] {
            MenuItem::SaveAndExit => {
                app.save()?;
                app.record("System exited and data saved");
                println!("Data saved. Goodbye!");
                return Ok(());
            }
            MenuItem::Quit => {
                if app.is_dirty()
                    && !Confirm::with_theme(&theme)
                        .with_prompt("Discard unsaved changes?")
                        .default(false)
                        .interact()?
                {
                    continue;
                }
                info!("shell exited without saving");
                return Ok(());
            }
            item => prompt_action(&theme, item)?,
        };

        if let Err(err) = app.dispatch(action, &mut stdout) {
            println!("Error: {err}");
        }
    }
}

fn prompt_action(theme: &ColorfulTheme, item: MenuItem) -> Result<Action> {
    let action = match item {
        MenuItem::AddEvent => {
            let name = prompt_text(theme, "Event name")?;
            let date: String = Input::with_theme(theme)
                .with_prompt("Event date (YYYY-MM-DD)")
                .validate_with(|input: &String| -> Result<(), String> {
                    parse_date(input).map(|_| ()).map_err(|err| err.to_string())
                })
                .interact_text()?;
            let priority: i64 = Input::with_theme(theme)
                .with_prompt("Priority (lower runs first)")
                .interact_text()?;
            let instructor: String = Input::with_theme(theme)
                .with_prompt("Instructor (optional)")
                .allow_empty(true)
                .interact_text()?;
            Action::Add(AddArgs {
                name,
                date: parse_date(&date)?,
                priority,
                instructor: Some(instructor),
            })
        }
        MenuItem::ViewNext => Action::Next,
        MenuItem::ExecuteNext => Action::Execute,
        MenuItem::AddDependency => Action::Depend(DependArgs {
            dependent: prompt_text(theme, "Event that has to wait")?,
            prerequisite: prompt_text(theme, "Event it depends on")?,
        }),
        MenuItem::CheckCycles => Action::Cycles,
        MenuItem::AddParticipant => Action::Join(prompt_participant(theme)?),
        MenuItem::RemoveParticipant => Action::Leave(prompt_participant(theme)?),
        MenuItem::SearchEvent => Action::Show(NameArgs {
            name: prompt_text(theme, "Event name")?,
        }),
        MenuItem::RemoveEvent => Action::Remove(NameArgs {
            name: prompt_text(theme, "Event name")?,
        }),
        MenuItem::Notify => Action::Notify(NotifyArgs {
            event: prompt_text(theme, "Event name")?,
            message: prompt_text(theme, "Message")?,
        }),
        MenuItem::Categorize => Action::Categorize,
        MenuItem::Overlaps => Action::Overlaps,
        MenuItem::Status => Action::Status,
        MenuItem::UpdateState => {
            let event = prompt_text(theme, "Event name")?;
            let labels: Vec<&str> = EventState::ALL.iter().map(|state| state.label()).collect();
            let selection = Select::with_theme(theme)
                .with_prompt("New state")
                .items(&labels)
                .default(0)
                .interact()?;
            Action::SetState(SetStateArgs {
                event,
                state: EventState::ALL[selection],
            })
        }
        MenuItem::RateEvent => Action::Rate(RateArgs {
            event: prompt_text(theme, "Event name")?,
            rating: prompt_rating(theme)?,
        }),
        MenuItem::RateInstructor => Action::RateInstructor(RateInstructorArgs {
            instructor: prompt_text(theme, "Instructor name")?,
            rating: prompt_rating(theme)?,
        }),
        MenuItem::RankInstructors => Action::Instructors,
        MenuItem::SaveAndExit | MenuItem::Quit => {
            anyhow::bail!("'{}' is not an event action", item.label())
        }
    };
    Ok(action)
}

fn prompt_text(theme: &ColorfulTheme, prompt: &str) -> Result<String> {
    let value: String = Input::with_theme(theme)
        .with_prompt(prompt)
        .interact_text()?;
    Ok(value.trim().to_string())
}

fn prompt_participant(theme: &ColorfulTheme) -> Result<ParticipantArgs> {
    Ok(ParticipantArgs {
        event: prompt_text(theme, "Event name")?,
        participant: prompt_text(theme, "Participant name")?,
    })
}

fn prompt_rating(theme: &ColorfulTheme) -> Result<i64> {
    Ok(Input::with_theme(theme)
        .with_prompt("Rating (1-5)")
        .interact_text()?)
}
