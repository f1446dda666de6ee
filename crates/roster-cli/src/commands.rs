// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::runtime::StoreRuntime;
use anyhow::{Context, Result, anyhow, bail};
use roster_app::{
    ALL_DEPARTMENTS, Browser, BrowserCommand, Collection, Contact, ContactDirectory,
    ContactFilter, ContactListing, DirectoryCommand, EditorCommand, EditorPhase, ListTitles,
    Listing, PanelCommand, RecordStore, Tag, TagEditSession, TagFilter, TagId, TagListing,
    TagPanel,
};
use roster_app::color::contrast_color;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Contacts {
        filter: ContactFilter,
        page: usize,
    },
    Departments,
    Contact {
        id: i64,
    },
    ContactTags {
        id: i64,
        add: Vec<i64>,
        remove: Vec<i64>,
    },
    Tags {
        search: String,
        page: usize,
    },
    Colors,
    TagAdd {
        name: String,
        comment: Option<String>,
        color: Option<String>,
    },
    TagEdit {
        id: i64,
        name: Option<String>,
        comment: Option<String>,
        color: Option<String>,
    },
    TagDelete {
        id: i64,
        yes: bool,
    },
}

impl Command {
    /// Parses everything after the global flags. `None` means no subcommand.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Option<Self>> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(None);
        };
        let mut flags = Flags::new(rest);
        let command = match name.as_ref() {
            "contacts" => Self::Contacts {
                filter: ContactFilter {
                    name: flags.value("--name")?.unwrap_or_default(),
                    department: flags
                        .value("--department")?
                        .filter(|department| department != ALL_DEPARTMENTS),
                    phone: flags.value("--phone")?.unwrap_or_default(),
                    email: flags.value("--email")?.unwrap_or_default(),
                },
                page: flags.page()?,
            },
            "departments" => Self::Departments,
            "contact" => {
                let id = flags.id("contact")?;
                if flags.word("tags") {
                    Self::ContactTags {
                        id,
                        add: flags.ids("--add")?,
                        remove: flags.ids("--remove")?,
                    }
                } else {
                    Self::Contact { id }
                }
            }
            "tags" => Self::Tags {
                search: flags.value("--search")?.unwrap_or_default(),
                page: flags.page()?,
            },
            "colors" => Self::Colors,
            "tag" => match flags.next_word().as_deref() {
                Some("add") => Self::TagAdd {
                    name: flags
                        .value("--name")?
                        .ok_or_else(|| anyhow!("tag add requires --name <text>"))?,
                    comment: flags.value("--comment")?,
                    color: flags.value("--color")?,
                },
                Some("edit") => Self::TagEdit {
                    id: flags.id("tag edit")?,
                    name: flags.value("--name")?,
                    comment: flags.value("--comment")?,
                    color: flags.value("--color")?,
                },
                Some("delete") => Self::TagDelete {
                    id: flags.id("tag delete")?,
                    yes: flags.switch("--yes"),
                },
                Some(other) => bail!("unknown tag action {other:?}; use add, edit, or delete"),
                None => bail!("tag requires an action: add, edit, or delete"),
            },
            other => bail!("unknown command {other:?}; run with --help to see supported commands"),
        };
        flags.finish()?;
        Ok(Some(command))
    }
}

/// Argument cursor for one subcommand. Each lookup consumes what it matched;
/// `finish` rejects anything left over.
struct Flags {
    args: Vec<String>,
}

impl Flags {
    fn new<S: AsRef<str>>(args: &[S]) -> Self {
        Self {
            args: args.iter().map(|arg| arg.as_ref().to_owned()).collect(),
        }
    }

    fn value(&mut self, flag: &str) -> Result<Option<String>> {
        let Some(index) = self.args.iter().position(|arg| arg == flag) else {
            return Ok(None);
        };
        if index + 1 >= self.args.len() {
            bail!("{flag} requires a value");
        }
        let value = self.args.remove(index + 1);
        self.args.remove(index);
        Ok(Some(value))
    }

    fn ids(&mut self, flag: &str) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        while let Some(raw) = self.value(flag)? {
            ids.push(parse_id(&raw, flag)?);
        }
        Ok(ids)
    }

    fn switch(&mut self, flag: &str) -> bool {
        let before = self.args.len();
        self.args.retain(|arg| arg != flag);
        self.args.len() != before
    }

    fn word(&mut self, word: &str) -> bool {
        if self.args.first().is_some_and(|arg| arg == word) {
            self.args.remove(0);
            return true;
        }
        false
    }

    fn next_word(&mut self) -> Option<String> {
        if self.args.first().is_some_and(|arg| !arg.starts_with("--")) {
            return Some(self.args.remove(0));
        }
        None
    }

    fn id(&mut self, command: &str) -> Result<i64> {
        let raw = self
            .next_word()
            .ok_or_else(|| anyhow!("{command} requires an id"))?;
        parse_id(&raw, command)
    }

    fn page(&mut self) -> Result<usize> {
        let Some(raw) = self.value("--page")? else {
            return Ok(1);
        };
        match raw.parse::<usize>() {
            Ok(page) if page >= 1 => Ok(page),
            _ => bail!("--page expects a number starting at 1, got {raw:?}"),
        }
    }

    fn finish(self) -> Result<()> {
        if let Some(extra) = self.args.first() {
            bail!("unexpected argument {extra:?}; run with --help to see supported options");
        }
        Ok(())
    }
}

fn parse_id(raw: &str, context: &str) -> Result<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => bail!("{context} expects a positive numeric id, got {raw:?}"),
    }
}

/// What a command needs besides the store: page size and where contact
/// pictures live.
pub struct Session<'a, S> {
    pub runtime: &'a StoreRuntime<S>,
    pub page_size: usize,
    pub site_url: Option<&'a str>,
    pub lists: &'a ListTitles,
}

impl<S: RecordStore> Session<'_, S> {
    pub fn execute(
        &self,
        command: Command,
        out: &mut impl Write,
        confirm: &mut dyn FnMut(&str) -> Result<bool>,
    ) -> Result<()> {
        match command {
            Command::Contacts { filter, page } => {
                let browser = self.browse::<ContactListing>(filter, page)?;
                for contact in browser.records() {
                    writeln!(
                        out,
                        "{}\t{}\t{}\t{}\t{}",
                        contact.id,
                        contact.display_name(),
                        contact.department.as_deref().unwrap_or("-"),
                        contact.phone_number.as_deref().unwrap_or("-"),
                        contact.email.as_deref().unwrap_or("-"),
                    )?;
                }
                write_footer(out, &browser, page)
            }
            Command::Departments => {
                let mut directory = ContactDirectory::new(self.page_size);
                self.runtime
                    .drive_directory(&mut directory, DirectoryCommand::Mount);
                if let Some(error) = directory.error() {
                    bail!("load department choices: {error}");
                }
                for department in directory.departments() {
                    writeln!(out, "{department}")?;
                }
                Ok(())
            }
            Command::Contact { id } => {
                let (_, session) = self.open_contact(id)?;
                self.write_contact(out, &session)
            }
            Command::ContactTags { id, add, remove } => {
                let (mut directory, session) = self.open_contact(id)?;
                if session.phase() == EditorPhase::Unavailable {
                    let reason = session
                        .error()
                        .map_or_else(|| "unknown error".to_owned(), ToString::to_string);
                    bail!("tags of contact {id} cannot be edited: {reason}");
                }
                let edits = add
                    .into_iter()
                    .map(|tag| EditorCommand::AddTag(TagId::new(tag)))
                    .chain(
                        remove
                            .into_iter()
                            .map(|tag| EditorCommand::RemoveTag(TagId::new(tag))),
                    );
                for edit in edits {
                    self.runtime
                        .drive_directory(&mut directory, DirectoryCommand::Edit(edit));
                    if let Some(error) = directory.detail().and_then(TagEditSession::error) {
                        bail!("edit tags of contact {id}: {error}");
                    }
                }
                let dirty = directory.detail().is_some_and(TagEditSession::is_dirty);
                if !dirty {
                    writeln!(out, "no changes")?;
                    return Ok(());
                }
                self.runtime
                    .drive_directory(&mut directory, DirectoryCommand::Edit(EditorCommand::Save));
                let session = directory
                    .detail()
                    .ok_or_else(|| anyhow!("contact {id} detail closed unexpectedly"))?;
                if session.phase() != EditorPhase::Saved {
                    let reason = session
                        .error()
                        .map_or_else(|| "save did not complete".to_owned(), ToString::to_string);
                    bail!("save tags of contact {id}: {reason}");
                }
                write_tag_line(out, session.tags())
            }
            Command::Tags { search, page } => {
                let browser = self.browse::<TagListing>(TagFilter { name: search }, page)?;
                for tag in browser.records() {
                    writeln!(
                        out,
                        "{}\t{}\t{}\t{}",
                        tag.id, tag.name, tag.color, tag.comment
                    )?;
                }
                write_footer(out, &browser, page)
            }
            Command::Colors => {
                let mut panel = TagPanel::new(self.page_size);
                self.runtime.drive_panel(&mut panel, PanelCommand::LoadPalette);
                if let Some(error) = panel.error() {
                    bail!("load default colors: {error}");
                }
                for swatch in panel.palette() {
                    let text = contrast_color(Some(&swatch.hex));
                    writeln!(out, "{}\t{}\ttext {text}", swatch.id, swatch.hex)?;
                }
                Ok(())
            }
            Command::TagAdd {
                name,
                comment,
                color,
            } => {
                let mut panel = TagPanel::new(self.page_size);
                self.runtime.drive_panel(&mut panel, PanelCommand::OpenNew);
                self.save_tag(&mut panel, Some(name), comment, color)?;
                let id = panel
                    .last_saved()
                    .ok_or_else(|| anyhow!("store did not report the new tag id"))?;
                writeln!(out, "added tag {id}")?;
                Ok(())
            }
            Command::TagEdit {
                id,
                name,
                comment,
                color,
            } => {
                let tag: Tag = self
                    .runtime
                    .store()
                    .get_by_id(Collection::Tags, id)
                    .with_context(|| format!("load tag {id}"))?;
                let mut panel = TagPanel::new(self.page_size);
                self.runtime.drive_panel(&mut panel, PanelCommand::OpenEdit(tag));
                self.save_tag(&mut panel, name, comment, color)?;
                writeln!(out, "updated tag {id}")?;
                Ok(())
            }
            Command::TagDelete { id, yes } => {
                if !yes && !confirm(&format!("Delete tag {id}? [y/N] "))? {
                    writeln!(out, "cancelled")?;
                    return Ok(());
                }
                let mut panel = TagPanel::new(self.page_size);
                self.runtime
                    .drive_panel(&mut panel, PanelCommand::RequestDelete(TagId::new(id)));
                self.runtime.drive_panel(&mut panel, PanelCommand::ConfirmDelete);
                if let Some(error) = panel.error() {
                    bail!("delete tag {id}: {error}");
                }
                writeln!(out, "deleted tag {id}")?;
                Ok(())
            }
        }
    }

    /// Runs the listing's query, then walks forward to the 1-based `page`.
    fn browse<L: Listing>(&self, filter: L::Filter, page: usize) -> Result<Browser<L>> {
        let mut browser = Browser::<L>::new(self.page_size);
        self.runtime
            .drive_browser(&mut browser, BrowserCommand::EditFilter(filter));
        self.runtime
            .drive_browser(&mut browser, BrowserCommand::ApplyFilter);
        check_browser(&browser)?;
        for _ in 1..page {
            if !browser.pager().has_next() {
                bail!(
                    "page {page} is past the end of the {} list (last page is {})",
                    L::LABEL,
                    browser.pager().page() + 1
                );
            }
            self.runtime
                .drive_browser(&mut browser, BrowserCommand::NextPage);
            check_browser(&browser)?;
        }
        Ok(browser)
    }

    fn open_contact(&self, id: i64) -> Result<(ContactDirectory, TagEditSession)> {
        let contact: Contact = self
            .runtime
            .store()
            .get_by_id(Collection::Contacts, id)
            .with_context(|| format!("load contact {id}"))?;
        let mut directory = ContactDirectory::new(self.page_size);
        self.runtime
            .drive_directory(&mut directory, DirectoryCommand::OpenDetail(contact));
        let session = directory
            .detail()
            .cloned()
            .ok_or_else(|| anyhow!("contact {id} detail did not open"))?;
        Ok((directory, session))
    }

    fn write_contact(&self, out: &mut impl Write, session: &TagEditSession) -> Result<()> {
        let contact = session.contact();
        writeln!(out, "{}", contact.display_name())?;
        let rows = [
            ("id", Some(contact.id.to_string())),
            ("title", contact.title.clone()),
            ("department", contact.department.clone()),
            ("phone", contact.phone_number.clone()),
            ("email", contact.email.clone()),
        ];
        for (label, value) in rows {
            writeln!(out, "  {label:<11}{}", value.as_deref().unwrap_or("-"))?;
        }
        let image = self
            .site_url
            .and_then(|site| contact.image_url(site, &self.lists.contacts))
            .or_else(|| contact.image_file_name())
            .unwrap_or_else(|| "(placeholder)".to_owned());
        writeln!(out, "  {:<11}{image}", "image")?;
        match session.phase() {
            EditorPhase::Unavailable => {
                let reason = session
                    .error()
                    .map_or_else(|| "unknown error".to_owned(), ToString::to_string);
                writeln!(out, "  {:<11}unavailable ({reason})", "tags")?;
                Ok(())
            }
            _ => {
                write!(out, "  {:<11}", "tags")?;
                write_tag_line(out, session.tags())
            }
        }
    }

    fn save_tag(
        &self,
        panel: &mut TagPanel,
        name: Option<String>,
        comment: Option<String>,
        hex: Option<String>,
    ) -> Result<()> {
        if let Some(name) = name {
            self.runtime.drive_panel(panel, PanelCommand::SetName(name));
        }
        if let Some(comment) = comment {
            self.runtime
                .drive_panel(panel, PanelCommand::SetComment(comment));
        }
        if let Some(hex) = hex {
            self.runtime
                .drive_panel(panel, PanelCommand::SetHex(hex.clone()));
            let applied = panel.form().is_some_and(|form| form.tag().color == hex);
            if !applied {
                bail!("tag color {hex:?} is not a hex color -- use #RGB or #RRGGBB");
            }
        }
        self.runtime.drive_panel(panel, PanelCommand::SubmitForm);
        if let Some(error) = panel.form().and_then(|form| form.error()) {
            bail!("save tag: {error}");
        }
        if let Some(error) = panel.error() {
            bail!("save tag: {error}");
        }
        Ok(())
    }
}

fn check_browser<L: Listing>(browser: &Browser<L>) -> Result<()> {
    match browser.pager().error() {
        Some(error) => bail!("load {}: {error}", L::LABEL),
        None => Ok(()),
    }
}

fn write_footer<L: Listing>(out: &mut impl Write, browser: &Browser<L>, page: usize) -> Result<()> {
    if browser.records().is_empty() {
        writeln!(out, "no {} found", L::LABEL)?;
        return Ok(());
    }
    if browser.pager().has_next() {
        writeln!(out, "page {page} (more: --page {})", page + 1)?;
    } else {
        writeln!(out, "page {page}")?;
    }
    Ok(())
}

fn write_tag_line(out: &mut impl Write, tags: &[Tag]) -> Result<()> {
    if tags.is_empty() {
        writeln!(out, "(none)")?;
        return Ok(());
    }
    let names: Vec<String> = tags
        .iter()
        .map(|tag| format!("{} [{}] #{}", tag.name, tag.color, tag.id))
        .collect();
    writeln!(out, "{}", names.join(", "))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Command, Session};
    use crate::runtime::StoreRuntime;
    use anyhow::Result;
    use roster_app::{Collection, Contact, ContactFilter, ListTitles, RecordStore, Tag, TagId};
    use roster_store::MemoryStore;
    use roster_testkit::DirectoryFaker;

    fn parse(args: &[&str]) -> Result<Command> {
        Command::parse(args)?.ok_or_else(|| anyhow::anyhow!("command expected"))
    }

    fn runtime(contacts: usize) -> Result<StoreRuntime<MemoryStore>> {
        let store = MemoryStore::new();
        DirectoryFaker::new(3).seed_store(&store, contacts)?;
        Ok(StoreRuntime::new(store))
    }

    fn run(
        runtime: &StoreRuntime<MemoryStore>,
        command: Command,
        answer: bool,
    ) -> Result<String> {
        let lists = ListTitles::default();
        let session = Session {
            runtime,
            page_size: 10,
            site_url: Some("https://corp.example/sites/hr"),
            lists: &lists,
        };
        let mut out = Vec::new();
        session.execute(command, &mut out, &mut |_| Ok(answer))?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn parses_contacts_filter_and_page() -> Result<()> {
        let command = parse(&[
            "contacts",
            "--name",
            "O'Brien",
            "--department",
            "Sales",
            "--page",
            "2",
        ])?;
        assert_eq!(
            command,
            Command::Contacts {
                filter: ContactFilter {
                    name: "O'Brien".to_owned(),
                    department: Some("Sales".to_owned()),
                    ..ContactFilter::default()
                },
                page: 2,
            }
        );
        Ok(())
    }

    #[test]
    fn all_departments_means_no_department_filter() -> Result<()> {
        let Command::Contacts { filter, .. } =
            parse(&["contacts", "--department", "All Departments"])?
        else {
            panic!("contacts command expected");
        };
        assert_eq!(filter.department, None);
        Ok(())
    }

    #[test]
    fn parses_repeated_tag_edits() -> Result<()> {
        let command = parse(&[
            "contact", "7", "tags", "--add", "1", "--remove", "4", "--add", "3",
        ])?;
        assert_eq!(
            command,
            Command::ContactTags {
                id: 7,
                add: vec![1, 3],
                remove: vec![4],
            }
        );
        Ok(())
    }

    #[test]
    fn parses_tag_actions() -> Result<()> {
        assert_eq!(
            parse(&["tag", "delete", "4", "--yes"])?,
            Command::TagDelete { id: 4, yes: true }
        );
        assert_eq!(
            parse(&["tag", "edit", "4", "--color", "#fff"])?,
            Command::TagEdit {
                id: 4,
                name: None,
                comment: None,
                color: Some("#fff".to_owned()),
            }
        );
        Ok(())
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(Command::parse(&["contacts", "--page", "0"]).is_err());
        assert!(Command::parse(&["contact", "abc"]).is_err());
        assert!(Command::parse(&["tag", "add"]).is_err());
        assert!(Command::parse(&["tag", "rename", "3"]).is_err());
        assert!(Command::parse(&["tags", "--bogus"]).is_err());
        assert!(Command::parse(&["contacts", "--name"]).is_err());
    }

    #[test]
    fn no_subcommand_parses_to_none() -> Result<()> {
        assert_eq!(Command::parse::<&str>(&[])?, None);
        Ok(())
    }

    #[test]
    fn contacts_pages_are_one_based() -> Result<()> {
        let runtime = runtime(15)?;
        let first = run(
            &runtime,
            Command::Contacts {
                filter: ContactFilter::default(),
                page: 1,
            },
            false,
        )?;
        assert_eq!(first.lines().count(), 11);
        assert!(first.ends_with("page 1 (more: --page 2)\n"));

        let second = run(
            &runtime,
            Command::Contacts {
                filter: ContactFilter::default(),
                page: 2,
            },
            false,
        )?;
        assert_eq!(second.lines().count(), 6);
        assert!(second.ends_with("page 2\n"));

        let error = run(
            &runtime,
            Command::Contacts {
                filter: ContactFilter::default(),
                page: 4,
            },
            false,
        )
        .expect_err("page past the end should fail");
        assert!(error.to_string().contains("past the end"));
        Ok(())
    }

    #[test]
    fn departments_list_starts_with_all() -> Result<()> {
        let output = run(&runtime(0)?, Command::Departments, false)?;
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("All Departments"));
        assert!(output.contains("Sales"));
        Ok(())
    }

    #[test]
    fn contact_tags_round_trip_through_the_store() -> Result<()> {
        let runtime = runtime(3)?;
        let contact: Contact = runtime.store().get_by_id(Collection::Contacts, 2)?;
        let fields = contact.update_fields(&[]);
        runtime.store().update(Collection::Contacts, 2, &fields)?;

        let output = run(
            &runtime,
            Command::ContactTags {
                id: 2,
                add: vec![4, 6],
                remove: vec![],
            },
            false,
        )?;
        assert!(output.contains("#4"));
        let stored: Contact = runtime.store().get_by_id(Collection::Contacts, 2)?;
        assert_eq!(stored.tag_ids, vec![TagId::new(4), TagId::new(6)]);

        let unchanged = run(
            &runtime,
            Command::ContactTags {
                id: 2,
                add: vec![4],
                remove: vec![9],
            },
            false,
        )?;
        assert_eq!(unchanged, "no changes\n");
        Ok(())
    }

    #[test]
    fn contact_detail_prints_image_placeholder_and_tags() -> Result<()> {
        let runtime = runtime(1)?;
        let contact: Contact = runtime.store().get_by_id(Collection::Contacts, 1)?;
        let mut fields = contact.update_fields(&[TagId::new(1)]);
        fields.insert("Image".to_owned(), serde_json::Value::Null);
        runtime.store().update(Collection::Contacts, 1, &fields)?;

        let output = run(&runtime, Command::Contact { id: 1 }, false)?;
        assert!(output.contains("(placeholder)"));
        assert!(output.contains("#1"));
        Ok(())
    }

    #[test]
    fn tag_add_rejects_invalid_color_before_saving() -> Result<()> {
        let runtime = runtime(0)?;
        let before = runtime.store().len(Collection::Tags)?;
        let error = run(
            &runtime,
            Command::TagAdd {
                name: "Remote".to_owned(),
                comment: None,
                color: Some("blue".to_owned()),
            },
            false,
        )
        .expect_err("invalid color should fail");
        assert!(error.to_string().contains("#RGB or #RRGGBB"));
        assert_eq!(runtime.store().len(Collection::Tags)?, before);
        Ok(())
    }

    #[test]
    fn tag_add_edit_and_confirmed_delete() -> Result<()> {
        let runtime = runtime(0)?;
        let added = run(
            &runtime,
            Command::TagAdd {
                name: "Remote".to_owned(),
                comment: Some("works from home".to_owned()),
                color: Some("#00ff00".to_owned()),
            },
            false,
        )?;
        let id: i64 = added
            .trim()
            .strip_prefix("added tag ")
            .ok_or_else(|| anyhow::anyhow!("unexpected output {added:?}"))?
            .parse()?;

        run(
            &runtime,
            Command::TagEdit {
                id,
                name: None,
                comment: None,
                color: Some("#abc".to_owned()),
            },
            false,
        )?;
        let tag: Tag = runtime.store().get_by_id(Collection::Tags, id)?;
        assert_eq!(tag.name, "Remote");
        assert_eq!(tag.color, "#abc");

        let declined = run(&runtime, Command::TagDelete { id, yes: false }, false)?;
        assert_eq!(declined, "cancelled\n");
        assert!(runtime.store().get_by_id::<Tag>(Collection::Tags, id).is_ok());

        run(&runtime, Command::TagDelete { id, yes: false }, true)?;
        assert!(runtime.store().get_by_id::<Tag>(Collection::Tags, id).is_err());
        Ok(())
    }

    #[test]
    fn colors_print_palette_with_contrast() -> Result<()> {
        let output = run(&runtime(0)?, Command::Colors, false)?;
        assert!(!output.is_empty());
        assert!(output.lines().all(|line| line.contains("text #")));
        Ok(())
    }
}
