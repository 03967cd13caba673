use std::time::Duration;

use serenity::{async_trait, model::Permissions};
use tracing::info;

use super::{ArgSpec, Args, Command, CommandContext, CommandDescriptor, MissingArgument, Services};
use crate::{
    cache::{ClassUpdate, CourseRecord, FetchClassError},
    collector::{
        ComponentWait, Either, EitherTarget, EitherWait, Outcome, OwnedComponentWait, Seed,
        SeedCleanup, TextWait,
    },
    course::{Career, CourseCode, ParseQueryError, Query, SectionRecord, Semester, Term},
    embed::{section_embed, section_lines, MAX_CONTENT_LENGTH},
    platform::{
        Button, ButtonStyle, ComponentPress, ComponentSpec, OutgoingMessage, Reply, SelectMenu,
        SelectOption,
    },
    Error,
};

const PICK_TIMEOUT: Duration = Duration::from_secs(60);
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);
const CANCEL: &str = "cancel";

const PICK_PREFIX: &str = "sections:pick:";
const PICK_CANCEL: &str = "sections:cancel";
const REFRESH_CONFIRM: &str = "refresh:confirm";
const REFRESH_CANCEL: &str = "refresh:cancel";

const PICK_HINT: &str = "Pick a section below or type its name, `cancel` to stop.";

const OPTIONS_PER_MENU: usize = 25;
// one row stays free for the cancel button
const MAX_MENUS: usize = 4;

#[derive(Debug, thiserror::Error)]
enum ArgError {
    #[error(transparent)]
    Missing(#[from] MissingArgument),
    #[error(transparent)]
    Parse(#[from] ParseQueryError),
}

/// Semesters offered as choices: every term of `year` and the year after.
pub fn semester_choices(year: u16) -> Vec<(String, String)> {
    [year, year + 1]
        .into_iter()
        .flat_map(|year| Term::ALL.map(|term| Semester { term, year }))
        .map(|semester| (semester.to_string(), semester.id()))
        .collect()
}

fn career_choices() -> Vec<(String, String)> {
    Career::ALL
        .into_iter()
        .map(|career| career.name().to_owned())
        .map(|name| (name.clone(), name))
        .collect()
}

fn course_arg() -> ArgSpec {
    ArgSpec::string("course", "Subject and catalog number")
        .examples(&["CSE 116", "MTH141"])
}

fn semester_arg(choices: &[(String, String)]) -> ArgSpec {
    ArgSpec::string("semester", "Semester the course is offered in")
        .choices(choices.to_vec())
}

fn career_arg() -> ArgSpec {
    ArgSpec::string("career", "Academic career, undergraduate by default")
        .optional()
        .choices(career_choices())
}

fn parse_query(args: &Args) -> Result<Query, ArgError> {
    let course: CourseCode = args.required_str("course")?.parse()?;
    let semester: Semester = args.required_str("semester")?.parse()?;
    let career = match args.str("career") {
        Some(career) => career.parse()?,
        None => Career::default(),
    };

    Ok(Query::new(&course, &semester, career))
}

fn not_found(query: &Query) -> String {
    format!(
        "Could not find {} during {}.\n\n\
         *Does this class exist? It may not be offered that semester.*",
        query.course, query.semester
    )
}

/// Parses the query arguments, telling the caller when they don't make sense.
async fn query_or_complain(ctx: &CommandContext<Services>) -> Result<Option<Query>, Error> {
    match parse_query(ctx.args()) {
        Ok(query) => Ok(Some(query)),
        Err(err) => {
            ctx.whisper(err.to_string()).await?;
            Ok(None)
        }
    }
}

/// Latest snapshot of the course, refetched when it has gone stale.
async fn lookup(
    ctx: &CommandContext<Services>,
    query: &Query,
) -> Result<Option<CourseRecord>, Error> {
    let services = &ctx.services;
    match services.cache.get_or_update(query, services.max_age).await {
        Ok(ClassUpdate::Cached(record)) => Ok(Some(record)),
        Ok(ClassUpdate::Fresh { old, new }) => {
            if let Some(old) = old {
                info!(
                    course = %query.course,
                    changed = changed_sections(Some(&old), &new),
                    "replaced stale snapshot"
                );
            }
            Ok(Some(new))
        }
        Err(FetchClassError::CourseNotFound(_)) => {
            ctx.whisper(not_found(query)).await?;
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// How many sections in `new` differ from, or are missing in, `old`.
pub fn changed_sections(old: Option<&CourseRecord>, new: &CourseRecord) -> usize {
    new.sections
        .iter()
        .filter(|section| {
            let previous = old.and_then(|old| {
                old.sections
                    .iter()
                    .find(|candidate| candidate.section == section.section)
            });
            previous != Some(*section)
        })
        .count()
}

fn button(custom_id: &str, label: &str, style: ButtonStyle) -> ComponentSpec {
    ComponentSpec::Button(Button {
        custom_id: custom_id.to_owned(),
        label: label.to_owned(),
        style,
    })
}

/// Select menus listing every named section, followed by a cancel button.
fn section_menus(record: &CourseRecord) -> Vec<ComponentSpec> {
    let options: Vec<_> = record
        .sections
        .iter()
        .filter_map(|record| {
            let name = record.section.as_deref()?;
            Some(SelectOption {
                label: name.to_owned(),
                value: name.to_owned(),
                description: record
                    .instructor
                    .as_deref()
                    .or(record.class_type.as_deref())
                    .map(str::to_owned),
            })
        })
        .collect();

    let mut components: Vec<_> = options
        .chunks(OPTIONS_PER_MENU)
        .take(MAX_MENUS)
        .enumerate()
        .map(|(n, chunk)| {
            ComponentSpec::Select(SelectMenu {
                custom_id: format!("{PICK_PREFIX}{n}"),
                placeholder: Some("Pick a section".to_owned()),
                options: chunk.to_vec(),
            })
        })
        .collect();
    components.push(button(PICK_CANCEL, "Cancel", ButtonStyle::Secondary));
    components
}

/// The section chosen from a menu, `None` for the cancel button.
fn picked_section<'a>(
    record: &'a CourseRecord,
    press: &ComponentPress,
) -> Option<&'a SectionRecord> {
    if !press.custom_id.starts_with(PICK_PREFIX) {
        return None;
    }

    press.values.first().and_then(|value| record.find(value))
}

/// The public `/sections` message: as many sections as fit, then the menus.
fn listing(query: &Query, record: &CourseRecord) -> Reply {
    let header = format!("**{} - {}**\n", query.course, query.semester);
    let footer = format!("\n\n{PICK_HINT}");
    let used = header.chars().count() + footer.chars().count();
    let lines = section_lines(&record.sections, MAX_CONTENT_LENGTH.saturating_sub(used));

    let content = format!("{header}{lines}{footer}");
    Reply::public(content).components(section_menus(record))
}

pub struct Info {
    descriptor: CommandDescriptor,
}

impl Info {
    pub fn new(semesters: &[(String, String)]) -> Self {
        Self {
            descriptor: CommandDescriptor::new("info", "Show enrollment details of a section")
                .arg(course_arg())
                .arg(semester_arg(semesters))
                .arg(
                    ArgSpec::string("section", "Section name, leave out to pick one")
                        .optional()
                        .examples(&["A1", "B2"]),
                )
                .arg(career_arg())
                .bot_permissions(Permissions::SEND_MESSAGES | Permissions::EMBED_LINKS)
                .cooldown(Duration::from_secs(3)),
        }
    }
}

#[async_trait]
impl Command<Services> for Info {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: CommandContext<Services>) -> Result<(), Error> {
        let Some(query) = query_or_complain(&ctx).await? else {
            return Ok(());
        };
        let Some(record) = lookup(&ctx, &query).await? else {
            return Ok(());
        };

        if let Some(section) = ctx.args().str("section") {
            match record.find(section) {
                Some(found) => {
                    let embed = section_embed(&query, found, record.timestamp);
                    ctx.reply(Reply::embed(embed)).await?
                }
                None => {
                    let err = FetchClassError::SectionNotFound(section.to_owned());
                    ctx.whisper(err.to_string()).await?
                }
            }
            return Ok(());
        }

        ctx.whisper(format!(
            "Which section of {}? Reply with its name, or `{CANCEL}` to stop.",
            query.course
        ))
        .await?;

        let lines = section_lines(&record.sections, MAX_CONTENT_LENGTH);
        let wait = TextWait {
            channel_id: ctx.channel_id(),
            author_id: ctx.author_id(),
            duration: PICK_TIMEOUT,
            seed: Some(Seed::Send(OutgoingMessage::text(lines))),
            cancel_token: Some(CANCEL.to_owned()),
            delete_replies: false,
            delete_seed_after: true,
        };
        let outcome = ctx
            .collector()
            .text(wait, |message| record.find(&message.content).cloned())
            .await;

        match outcome {
            Outcome::Matched(found) => {
                let embed = section_embed(&query, &found, record.timestamp);
                ctx.reply(Reply::embed(embed)).await?
            }
            Outcome::Cancelled => ctx.whisper("Cancelled.").await?,
            Outcome::TimedOut => ctx.whisper("No section picked, giving up.").await?,
            Outcome::Unstarted => {
                ctx.whisper("I couldn't post the section list in this channel.")
                    .await?
            }
        }

        Ok(())
    }
}

pub struct Sections {
    descriptor: CommandDescriptor,
}

impl Sections {
    pub fn new(semesters: &[(String, String)]) -> Self {
        Self {
            descriptor: CommandDescriptor::new("sections", "List a class's sections and pick one")
                .arg(course_arg())
                .arg(semester_arg(semesters))
                .arg(career_arg())
                .bot_permissions(
                    Permissions::SEND_MESSAGES
                        | Permissions::EMBED_LINKS
                        | Permissions::MANAGE_MESSAGES,
                )
                .cooldown(Duration::from_secs(10))
                .guild_only(),
        }
    }
}

#[async_trait]
impl Command<Services> for Sections {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: CommandContext<Services>) -> Result<(), Error> {
        let Some(query) = query_or_complain(&ctx).await? else {
            return Ok(());
        };
        let Some(record) = lookup(&ctx, &query).await? else {
            return Ok(());
        };

        ctx.reply(listing(&query, &record)).await?;
        let posted = ctx.responder().original().await?;

        let wait = EitherWait {
            channel_id: ctx.channel_id(),
            author_id: ctx.author_id(),
            duration: PICK_TIMEOUT,
            target: EitherTarget::Seeded {
                seed: Seed::Reuse(posted),
                cleanup: SeedCleanup::ClearComponents,
            },
            cancel_token: Some(CANCEL.to_owned()),
            delete_replies: true,
            acknowledge: true,
        };
        let outcome = ctx
            .collector()
            .either(wait, |message| record.find(&message.content).cloned())
            .await;

        let picked = match outcome {
            Outcome::Matched(Either::Text(found)) => Some(found),
            Outcome::Matched(Either::Component(press)) => picked_section(&record, &press).cloned(),
            Outcome::Cancelled => None,
            Outcome::TimedOut => {
                ctx.whisper("No section picked, giving up.").await?;
                return Ok(());
            }
            // the listing already exists, nothing to send
            Outcome::Unstarted => return Ok(()),
        };

        match picked {
            Some(found) => {
                let embed = section_embed(&query, &found, record.timestamp);
                ctx.reply(Reply::embed(embed)).await?
            }
            None => ctx.whisper("Cancelled.").await?,
        }

        Ok(())
    }
}

pub struct Refresh {
    descriptor: CommandDescriptor,
}

impl Refresh {
    pub fn new(semesters: &[(String, String)]) -> Self {
        Self {
            descriptor: CommandDescriptor::new("refresh", "Refetch a class from the source")
                .arg(course_arg())
                .arg(semester_arg(semesters))
                .arg(career_arg())
                .owner_only(),
        }
    }
}

#[async_trait]
impl Command<Services> for Refresh {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: CommandContext<Services>) -> Result<(), Error> {
        let Some(query) = query_or_complain(&ctx).await? else {
            return Ok(());
        };

        ctx.whisper("Waiting for confirmation.").await?;

        let Query {
            course,
            semester,
            career,
        } = &query;
        let question = format!("Refetch **{course}** ({semester}, {career})?");
        let prompt = OutgoingMessage::text(question).components(vec![
            button(REFRESH_CONFIRM, "Refetch", ButtonStyle::Success),
            button(REFRESH_CANCEL, "Cancel", ButtonStyle::Danger),
        ]);
        let wait = OwnedComponentWait {
            channel_id: ctx.channel_id(),
            author_id: ctx.author_id(),
            duration: CONFIRM_TIMEOUT,
            seed: Seed::Send(prompt),
            acknowledge: true,
            cleanup: SeedCleanup::Delete,
        };

        match ctx.collector().owned_component(wait).await {
            Outcome::Matched(press) if press.custom_id == REFRESH_CONFIRM => {
                let cache = &ctx.services.cache;
                let old = cache.get(&query).await?;
                match cache.update(&query).await {
                    Ok(new) => {
                        let fetched = new.sections.len();
                        let changed = changed_sections(old.as_ref(), &new);
                        let summary = format!("Refetched {fetched} sections, {changed} changed.");
                        ctx.whisper(summary).await?
                    }
                    Err(FetchClassError::CourseNotFound(_)) => {
                        ctx.whisper(not_found(&query)).await?
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            Outcome::Matched(_) | Outcome::Cancelled => ctx.whisper("Refresh cancelled.").await?,
            Outcome::TimedOut => ctx.whisper("No answer, nothing was refetched.").await?,
            Outcome::Unstarted => {
                ctx.whisper("I couldn't post the confirmation in this channel.")
                    .await?
            }
        }

        Ok(())
    }
}

pub struct Purge {
    descriptor: CommandDescriptor,
}

impl Purge {
    pub fn new() -> Self {
        let older_than = ArgSpec::integer("older_than", "Age in seconds, defaults to the max age")
            .optional()
            .examples(&["3600"]);

        Self {
            descriptor: CommandDescriptor::new("purge", "Drop cached snapshots past an age")
                .arg(older_than)
                .user_permissions(Permissions::MANAGE_GUILD | Permissions::ADMINISTRATOR)
                .guild_only(),
        }
    }
}

impl Default for Purge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command<Services> for Purge {
    fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: CommandContext<Services>) -> Result<(), Error> {
        let max_age = ctx
            .args()
            .integer("older_than")
            .and_then(|secs| u64::try_from(secs).ok())
            .map_or(ctx.services.max_age, Duration::from_secs);
        let namespace = format!("purge:{}:", ctx.author_id());
        let confirm = format!("{namespace}confirm");

        let keep = format!("{namespace}cancel");
        let secs = max_age.as_secs();
        let question = format!("Delete cached snapshots older than {secs}s?");
        let buttons = vec![
            button(&confirm, "Delete", ButtonStyle::Danger),
            button(&keep, "Keep", ButtonStyle::Secondary),
        ];
        ctx.reply(Reply::ephemeral(question).components(buttons))
            .await?;

        // ephemeral replies can't be edited through the channel, so the wait
        // is scoped by custom id instead of by message
        let wait = ComponentWait {
            channel_id: ctx.channel_id(),
            author_id: ctx.author_id(),
            duration: CONFIRM_TIMEOUT,
            namespace,
            acknowledge: true,
        };

        match ctx.collector().component(wait).await {
            Outcome::Matched(press) if press.custom_id == confirm => {
                let purged = ctx.services.cache.purge(max_age).await?;
                info!(purged, user = %ctx.author_id(), "purged cache");
                ctx.whisper(format!("Purged {purged} snapshots.")).await?;
            }
            Outcome::Matched(_) => ctx.whisper("Nothing was purged.").await?,
            _ => ctx.whisper("No answer, nothing was purged.").await?,
        }

        Ok(())
    }
}
