// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{debug, warn};

use crate::{Contact, ContactId, DirectoryError, DirectoryResult, Fields, Tag, TagId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorPhase {
    FetchingTags,
    /// Tag resolution failed; nothing is editable until `Refetch` succeeds.
    Unavailable,
    Ready,
    Saving,
    Saved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorCommand {
    Refetch,
    TagsResolved {
        seq: u64,
        result: DirectoryResult<Vec<Tag>>,
    },
    AddTag(TagId),
    TagFetched {
        seq: u64,
        result: DirectoryResult<Tag>,
    },
    RemoveTag(TagId),
    Save,
    SaveFinished {
        seq: u64,
        result: DirectoryResult<()>,
    },
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEffect {
    /// Look up every identifier; any single failure fails the whole set.
    ResolveTags { seq: u64, ids: Vec<TagId> },
    FetchTag { seq: u64, id: TagId },
    SaveContact {
        seq: u64,
        contact_id: ContactId,
        fields: Fields,
    },
    /// The save landed; the owner should refresh whatever lists the contact.
    Completed { contact_id: ContactId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCandidate<'a> {
    pub tag: &'a Tag,
    pub attached: bool,
}

/// Working copy of one contact's tags, kept apart from the last fetched
/// snapshot until a save succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEditSession {
    contact: Contact,
    snapshot: Vec<Tag>,
    working: Vec<Tag>,
    phase: EditorPhase,
    seq: u64,
    resolve_seq: Option<u64>,
    save_seq: Option<u64>,
    pending_adds: Vec<(u64, TagId)>,
    error: Option<DirectoryError>,
}

impl TagEditSession {
    pub fn open(contact: Contact) -> (Self, Option<EditorEffect>) {
        Self::open_after(contact, 0)
    }

    /// Opens a session whose request numbers start after `last_seq`, so
    /// replies addressed to an earlier session can never match this one.
    pub fn open_after(contact: Contact, last_seq: u64) -> (Self, Option<EditorEffect>) {
        let mut session = Self {
            contact,
            snapshot: Vec::new(),
            working: Vec::new(),
            phase: EditorPhase::FetchingTags,
            seq: last_seq,
            resolve_seq: None,
            save_seq: None,
            pending_adds: Vec::new(),
            error: None,
        };
        let effect = session.start_resolution();
        (session, effect)
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn phase(&self) -> EditorPhase {
        self.phase
    }

    pub fn tags(&self) -> &[Tag] {
        &self.working
    }

    pub fn snapshot(&self) -> &[Tag] {
        &self.snapshot
    }

    pub fn error(&self) -> Option<&DirectoryError> {
        self.error.as_ref()
    }

    /// Highest request number this session has issued.
    pub fn last_seq(&self) -> u64 {
        self.seq
    }

    pub fn is_dirty(&self) -> bool {
        self.working != self.snapshot
    }

    pub fn is_attached(&self, id: TagId) -> bool {
        self.working.iter().any(|tag| tag.id == id)
            || self.pending_adds.iter().any(|(_, pending)| *pending == id)
    }

    pub fn working_ids(&self) -> Vec<TagId> {
        self.working.iter().map(|tag| tag.id).collect()
    }

    /// Every known tag, flagged when it is already attached and so not addable.
    pub fn candidates<'a>(&self, all: &'a [Tag]) -> Vec<TagCandidate<'a>> {
        all.iter()
            .map(|tag| TagCandidate {
                tag,
                attached: self.is_attached(tag.id),
            })
            .collect()
    }

    pub fn dispatch(&mut self, command: EditorCommand) -> Option<EditorEffect> {
        match command {
            EditorCommand::Refetch => {
                if matches!(self.phase, EditorPhase::FetchingTags | EditorPhase::Saving) {
                    return None;
                }
                self.start_resolution()
            }
            EditorCommand::TagsResolved { seq, result } => {
                if self.resolve_seq != Some(seq) {
                    debug!(seq, "discarding superseded tag resolution");
                    return None;
                }
                self.resolve_seq = None;
                match result {
                    Ok(tags) => {
                        self.snapshot = tags.clone();
                        self.working = tags;
                        self.phase = EditorPhase::Ready;
                        self.error = None;
                    }
                    Err(error) => {
                        warn!(contact = %self.contact.id, %error, "tag resolution failed");
                        self.phase = EditorPhase::Unavailable;
                        self.error = Some(error);
                    }
                }
                None
            }
            EditorCommand::AddTag(id) => {
                if !self.is_editable() || self.is_attached(id) {
                    return None;
                }
                let seq = self.next_seq();
                self.pending_adds.push((seq, id));
                Some(EditorEffect::FetchTag { seq, id })
            }
            EditorCommand::TagFetched { seq, result } => {
                let Some(index) = self.pending_adds.iter().position(|(pending, _)| *pending == seq)
                else {
                    debug!(seq, "discarding tag lookup nobody is waiting for");
                    return None;
                };
                let (_, id) = self.pending_adds.remove(index);
                match result {
                    Ok(tag) if self.working.iter().all(|existing| existing.id != tag.id) => {
                        self.working.push(tag);
                        self.mark_edited();
                    }
                    Ok(_) => {}
                    Err(error) => {
                        warn!(tag = %id, %error, "tag lookup failed");
                        self.error = Some(error);
                    }
                }
                None
            }
            EditorCommand::RemoveTag(id) => {
                if !self.is_editable() {
                    return None;
                }
                let before = self.working.len();
                self.working.retain(|tag| tag.id != id);
                if self.working.len() != before {
                    self.mark_edited();
                }
                None
            }
            EditorCommand::Save => {
                if !self.is_editable() {
                    return None;
                }
                if !self.pending_adds.is_empty() {
                    debug!("save requested while tag lookups are still pending");
                    return None;
                }
                let seq = self.next_seq();
                self.save_seq = Some(seq);
                self.phase = EditorPhase::Saving;
                self.error = None;
                Some(EditorEffect::SaveContact {
                    seq,
                    contact_id: self.contact.id,
                    fields: self.contact.update_fields(&self.working_ids()),
                })
            }
            EditorCommand::SaveFinished { seq, result } => {
                if self.save_seq != Some(seq) {
                    debug!(seq, "discarding superseded save result");
                    return None;
                }
                self.save_seq = None;
                match result {
                    Ok(()) => {
                        self.contact.tag_ids = self.working_ids();
                        self.snapshot = self.working.clone();
                        self.phase = EditorPhase::Saved;
                        Some(EditorEffect::Completed {
                            contact_id: self.contact.id,
                        })
                    }
                    Err(error) => {
                        warn!(contact = %self.contact.id, %error, "saving tags failed");
                        self.phase = EditorPhase::Ready;
                        self.error = Some(error);
                        None
                    }
                }
            }
            EditorCommand::Cancel => {
                if matches!(self.phase, EditorPhase::Saving | EditorPhase::Unavailable) {
                    return None;
                }
                self.pending_adds.clear();
                self.working = self.snapshot.clone();
                self.error = None;
                if self.phase == EditorPhase::Saved {
                    self.phase = EditorPhase::Ready;
                }
                None
            }
        }
    }

    fn start_resolution(&mut self) -> Option<EditorEffect> {
        self.pending_adds.clear();
        self.error = None;
        if self.contact.tag_ids.is_empty() {
            self.resolve_seq = None;
            self.snapshot.clear();
            self.working.clear();
            self.phase = EditorPhase::Ready;
            return None;
        }
        let seq = self.next_seq();
        self.resolve_seq = Some(seq);
        self.phase = EditorPhase::FetchingTags;
        Some(EditorEffect::ResolveTags {
            seq,
            ids: self.contact.tag_ids.clone(),
        })
    }

    fn is_editable(&self) -> bool {
        matches!(self.phase, EditorPhase::Ready | EditorPhase::Saved)
    }

    fn mark_edited(&mut self) {
        if self.phase == EditorPhase::Saved {
            self.phase = EditorPhase::Ready;
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }
}

#[cfg(test)]
mod tests {
    use super::{EditorCommand, EditorEffect, EditorPhase, TagEditSession};
    use crate::{Contact, ContactId, DirectoryError, Tag, TagId};
    use serde_json::json;

    fn tag(id: i64, name: &str) -> Tag {
        Tag {
            id: TagId::new(id),
            title: String::new(),
            name: name.to_owned(),
            comment: String::new(),
            color: "#0366d6".to_owned(),
        }
    }

    fn contact(tag_ids: &[i64]) -> Contact {
        Contact {
            id: ContactId::new(42),
            title: Some("Engineer".to_owned()),
            first_name: Some("Lin".to_owned()),
            last_name: Some("Park".to_owned()),
            department: Some("IT".to_owned()),
            phone_number: None,
            email: Some("lin@corp.example".to_owned()),
            image: None,
            tag_ids: tag_ids.iter().copied().map(TagId::new).collect(),
        }
    }

    fn ready_session(tags: &[Tag]) -> TagEditSession {
        let ids = tags.iter().map(|tag| tag.id.get()).collect::<Vec<_>>();
        let (mut session, effect) = TagEditSession::open(contact(&ids));
        if let Some(EditorEffect::ResolveTags { seq, ids: requested }) = effect {
            assert_eq!(requested.len(), tags.len());
            session.dispatch(EditorCommand::TagsResolved {
                seq,
                result: Ok(tags.to_vec()),
            });
        }
        assert_eq!(session.phase(), EditorPhase::Ready);
        session
    }

    fn add(session: &mut TagEditSession, tag: Tag) {
        match session.dispatch(EditorCommand::AddTag(tag.id)) {
            Some(EditorEffect::FetchTag { seq, id }) => {
                assert_eq!(id, tag.id);
                session.dispatch(EditorCommand::TagFetched {
                    seq,
                    result: Ok(tag),
                });
            }
            other => panic!("expected tag fetch, got {other:?}"),
        }
    }

    #[test]
    fn open_resolves_tags_in_identifier_order() {
        let (session, effect) = TagEditSession::open(contact(&[3, 1]));
        assert_eq!(session.phase(), EditorPhase::FetchingTags);
        assert_eq!(
            effect,
            Some(EditorEffect::ResolveTags {
                seq: 1,
                ids: vec![TagId::new(3), TagId::new(1)],
            })
        );
    }

    #[test]
    fn reopened_session_numbers_requests_after_the_previous_one() {
        let (first, effect) = TagEditSession::open(contact(&[1]));
        assert!(matches!(effect, Some(EditorEffect::ResolveTags { seq: 1, .. })));
        let (_, effect) = TagEditSession::open_after(contact(&[1]), first.last_seq());
        assert!(matches!(effect, Some(EditorEffect::ResolveTags { seq: 2, .. })));
    }

    #[test]
    fn contact_without_tags_is_ready_immediately() {
        let (session, effect) = TagEditSession::open(contact(&[]));
        assert!(effect.is_none());
        assert_eq!(session.phase(), EditorPhase::Ready);
        assert!(session.tags().is_empty());
    }

    #[test]
    fn failed_resolution_makes_session_unavailable() {
        let (mut session, effect) = TagEditSession::open(contact(&[1, 2]));
        let Some(EditorEffect::ResolveTags { seq, .. }) = effect else {
            panic!("resolve effect expected");
        };
        let error = DirectoryError::PartialLookup {
            id: TagId::new(2),
            message: "404".to_owned(),
        };
        session.dispatch(EditorCommand::TagsResolved {
            seq,
            result: Err(error.clone()),
        });
        assert_eq!(session.phase(), EditorPhase::Unavailable);
        assert_eq!(session.error(), Some(&error));
        assert!(session.tags().is_empty());
        assert!(session.dispatch(EditorCommand::AddTag(TagId::new(5))).is_none());
        assert!(session.dispatch(EditorCommand::Cancel).is_none());
        assert_eq!(session.phase(), EditorPhase::Unavailable);
        assert_eq!(session.error(), Some(&error));

        let retry = session.dispatch(EditorCommand::Refetch);
        assert!(matches!(retry, Some(EditorEffect::ResolveTags { .. })));
        assert_eq!(session.phase(), EditorPhase::FetchingTags);
    }

    #[test]
    fn adding_an_attached_tag_is_a_no_op() {
        let mut session = ready_session(&[tag(1, "Mentor")]);
        assert!(session.dispatch(EditorCommand::AddTag(TagId::new(1))).is_none());
        assert_eq!(session.tags().len(), 1);

        let first = session.dispatch(EditorCommand::AddTag(TagId::new(2)));
        assert!(first.is_some());
        assert!(
            session.dispatch(EditorCommand::AddTag(TagId::new(2))).is_none(),
            "a pending addition also blocks duplicates"
        );
    }

    #[test]
    fn candidates_flag_attached_tags() {
        let session = ready_session(&[tag(1, "Mentor")]);
        let all = vec![tag(1, "Mentor"), tag(2, "Remote")];
        let candidates = session.candidates(&all);
        assert!(candidates[0].attached);
        assert!(!candidates[1].attached);
    }

    #[test]
    fn removing_an_absent_tag_is_a_no_op() {
        let mut session = ready_session(&[tag(1, "Mentor")]);
        assert!(session.dispatch(EditorCommand::RemoveTag(TagId::new(9))).is_none());
        assert_eq!(session.tags(), [tag(1, "Mentor")]);
        assert!(!session.is_dirty());
    }

    #[test]
    fn cancel_restores_open_time_snapshot() {
        let original = vec![tag(1, "Mentor"), tag(2, "Remote")];
        let mut session = ready_session(&original);

        add(&mut session, tag(3, "On call"));
        add(&mut session, tag(4, "Speaker"));
        session.dispatch(EditorCommand::RemoveTag(TagId::new(1)));
        assert!(session.is_dirty());

        session.dispatch(EditorCommand::Cancel);
        assert_eq!(session.tags(), original.as_slice());
        assert!(!session.is_dirty());
    }

    #[test]
    fn cancel_drops_in_flight_additions() {
        let mut session = ready_session(&[tag(1, "Mentor")]);
        let Some(EditorEffect::FetchTag { seq, .. }) =
            session.dispatch(EditorCommand::AddTag(TagId::new(2)))
        else {
            panic!("fetch expected");
        };
        session.dispatch(EditorCommand::Cancel);
        session.dispatch(EditorCommand::TagFetched {
            seq,
            result: Ok(tag(2, "Remote")),
        });
        assert_eq!(session.tags(), [tag(1, "Mentor")]);
    }

    #[test]
    fn save_sends_full_working_list() {
        let mut session = ready_session(&[tag(1, "Mentor"), tag(2, "Remote")]);
        add(&mut session, tag(5, "Speaker"));
        session.dispatch(EditorCommand::RemoveTag(TagId::new(1)));

        let Some(EditorEffect::SaveContact {
            seq,
            contact_id,
            fields,
        }) = session.dispatch(EditorCommand::Save)
        else {
            panic!("save effect expected");
        };
        assert_eq!(contact_id, ContactId::new(42));
        assert_eq!(fields.get("TagsId"), Some(&json!([2, 5])));
        assert_eq!(fields.get("LastName"), Some(&json!("Park")));
        assert_eq!(session.phase(), EditorPhase::Saving);
        assert!(session.dispatch(EditorCommand::RemoveTag(TagId::new(2))).is_none());

        let done = session.dispatch(EditorCommand::SaveFinished { seq, result: Ok(()) });
        assert_eq!(
            done,
            Some(EditorEffect::Completed {
                contact_id: ContactId::new(42)
            })
        );
        assert_eq!(session.phase(), EditorPhase::Saved);
        assert_eq!(session.contact().tag_ids, vec![TagId::new(2), TagId::new(5)]);
        assert!(!session.is_dirty());
    }

    #[test]
    fn failed_save_keeps_working_set() {
        let mut session = ready_session(&[tag(1, "Mentor")]);
        add(&mut session, tag(2, "Remote"));
        let Some(EditorEffect::SaveContact { seq, .. }) = session.dispatch(EditorCommand::Save)
        else {
            panic!("save effect expected");
        };
        let error = DirectoryError::Save("403 forbidden".to_owned());
        let effect = session.dispatch(EditorCommand::SaveFinished {
            seq,
            result: Err(error.clone()),
        });
        assert!(effect.is_none());
        assert_eq!(session.phase(), EditorPhase::Ready);
        assert_eq!(session.error(), Some(&error));
        assert_eq!(session.tags(), [tag(1, "Mentor"), tag(2, "Remote")]);
        assert_eq!(session.snapshot(), [tag(1, "Mentor")]);
    }

    #[test]
    fn failed_lookup_during_add_keeps_set_and_reports() {
        let mut session = ready_session(&[tag(1, "Mentor")]);
        let Some(EditorEffect::FetchTag { seq, .. }) =
            session.dispatch(EditorCommand::AddTag(TagId::new(8)))
        else {
            panic!("fetch expected");
        };
        session.dispatch(EditorCommand::TagFetched {
            seq,
            result: Err(DirectoryError::Fetch("gone".to_owned())),
        });
        assert_eq!(session.tags(), [tag(1, "Mentor")]);
        assert!(session.error().is_some());
        assert!(!session.is_attached(TagId::new(8)));
    }

    #[test]
    fn save_waits_for_pending_lookups() {
        let mut session = ready_session(&[]);
        session.dispatch(EditorCommand::AddTag(TagId::new(3)));
        assert!(session.dispatch(EditorCommand::Save).is_none());
        assert_eq!(session.phase(), EditorPhase::Ready);
    }
}
