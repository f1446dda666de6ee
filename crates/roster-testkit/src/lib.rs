// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod flaky;

pub use flaky::{FlakyStore, Operation};

use anyhow::Result;
use roster_app::{Collection, ColorId, Contact, ContactId, DefaultColor, Tag, TagId};
use roster_store::MemoryStore;

const DEPARTMENTS: [&str; 8] = [
    "Engineering",
    "Finance",
    "HR",
    "IT",
    "Legal",
    "Marketing",
    "Operations",
    "Sales",
];

const JOB_TITLES: [&str; 12] = [
    "Analyst",
    "Architect",
    "Coordinator",
    "Consultant",
    "Director",
    "Engineer",
    "Manager",
    "Recruiter",
    "Specialist",
    "Strategist",
    "Technician",
    "Writer",
];

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "O'Brien", "Morris", "Foster", "Brooks",
];

const TAG_NAMES: [(&str, &str); 10] = [
    ("Mentor", "Pairs with new hires"),
    ("Remote", "Works from home most days"),
    ("On call", "Carries the pager this rotation"),
    ("Speaker", "Presents at conferences"),
    ("First aider", "Certified for first aid"),
    ("Fire warden", "Floor evacuation lead"),
    ("Interviewer", "Sits on hiring panels"),
    ("Bilingual", "Handles customer calls in two languages"),
    ("Union rep", ""),
    ("Volunteer", "Community day organizer"),
];

/// Swatches offered by the tag form's color picker.
const PALETTE: [&str; 12] = [
    "#b60205", "#d93f0b", "#fbca04", "#0e8a16", "#006b75", "#1d76db", "#0052cc", "#5319e7",
    "#e99695", "#f9d0c4", "#fef2c0", "#c2e0c6",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator for directory fixtures; the same seed always yields
/// the same people, tags, and palette.
#[derive(Debug, Clone)]
pub struct DirectoryFaker {
    rng: DeterministicRng,
    seed: u64,
}

impl DirectoryFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    /// A contact carrying up to three of `tag_pool`, in pool order.
    pub fn contact(&mut self, id: i64, tag_pool: &[TagId]) -> Contact {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let department = self.pick(&DEPARTMENTS);
        let title = self.pick(&JOB_TITLES);

        let phone = self
            .rng
            .bool()
            .then(|| format!("555-{:04}", self.int_n(10_000)));
        let email = format!(
            "{}.{}@corp.example",
            first.to_lowercase(),
            last.to_lowercase().replace('\'', "")
        );
        let image = self.rng.bool().then(|| {
            format!(
                r#"{{"type":"thumbnail","fileName":"{}-{id}.png"}}"#,
                first.to_lowercase()
            )
        });

        let wanted = self.int_n(4).min(tag_pool.len());
        let mut tag_ids = Vec::with_capacity(wanted);
        while tag_ids.len() < wanted {
            let candidate = tag_pool[self.int_n(tag_pool.len())];
            if !tag_ids.contains(&candidate) {
                tag_ids.push(candidate);
            }
        }
        tag_ids.sort();

        Contact {
            id: ContactId::new(id),
            title: Some(title.to_owned()),
            first_name: Some(first.to_owned()),
            last_name: Some(last.to_owned()),
            department: Some(department.to_owned()),
            phone_number: phone,
            email: Some(email),
            image,
            tag_ids,
        }
    }

    /// Tags are drawn from a fixed catalogue by position so ids stay stable.
    pub fn tag(&mut self, id: i64) -> Tag {
        let index = usize::try_from(id.unsigned_abs()).unwrap_or_default() % TAG_NAMES.len();
        let (name, comment) = TAG_NAMES[index];
        Tag {
            id: TagId::new(id),
            title: name.to_owned(),
            name: name.to_owned(),
            comment: comment.to_owned(),
            color: self.pick(&PALETTE).to_owned(),
        }
    }

    pub fn palette(&self) -> Vec<DefaultColor> {
        PALETTE
            .iter()
            .zip(1_i64..)
            .map(|(hex, id)| DefaultColor {
                id: ColorId::new(id),
                hex: (*hex).to_owned(),
            })
            .collect()
    }

    /// Fills `store` with the full tag catalogue, the palette, department
    /// choices, and `contacts` people.
    pub fn seed_store(&mut self, store: &MemoryStore, contacts: usize) -> Result<()> {
        for color in self.palette() {
            store.insert(Collection::DefaultColors, &color)?;
        }
        let mut tag_ids = Vec::with_capacity(TAG_NAMES.len());
        for id in (1_i64..).take(TAG_NAMES.len()) {
            let tag = self.tag(id);
            tag_ids.push(TagId::new(store.insert(Collection::Tags, &tag)?));
        }
        store.set_choices(
            Collection::Contacts,
            "Department",
            departments().iter().map(|name| (*name).to_owned()).collect(),
        )?;
        for id in (1_i64..).take(contacts) {
            let contact = self.contact(id, &tag_ids);
            store.insert(Collection::Contacts, &contact)?;
        }
        Ok(())
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

pub fn departments() -> &'static [&'static str] {
    &DEPARTMENTS
}

pub fn tag_catalogue_len() -> usize {
    TAG_NAMES.len()
}
