//! Full-text profile search.
//!
//! Indexed fields are location, about_me, first and last name and the
//! owning user's login.  Any word prefix of at least
//! [`SEARCH_MIN_PREFIX_LEN`] characters matches.

use std::collections::{BTreeSet, HashMap};

use hearth_shared::constants::SEARCH_MIN_PREFIX_LEN;
use hearth_shared::{Page, ProfileId};
use hearth_store::{Database, Profile};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub profile_id: ProfileId,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub login: Option<String>,
}

impl ProfileDocument {
    pub fn new(profile: &Profile, login: Option<&str>) -> Self {
        Self {
            profile_id: profile.id,
            location: profile.location.clone(),
            about_me: profile.about_me.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            login: login.map(str::to_string),
        }
    }

    /// Lowercased words across every indexed field.
    pub fn words(&self) -> Vec<String> {
        [
            &self.location,
            &self.about_me,
            &self.first_name,
            &self.last_name,
            &self.login,
        ]
        .into_iter()
        .flatten()
        .flat_map(|field| tokenize(field))
        .collect()
    }

    /// Every searchable prefix, deduplicated.
    pub fn prefixes(&self) -> BTreeSet<String> {
        self.words().iter().flat_map(|w| prefixes_of(w)).collect()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn prefixes_of(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    (SEARCH_MIN_PREFIX_LEN..=chars.len())
        .map(|n| chars[..n].iter().collect())
        .collect()
}

pub trait SearchIndexer {
    fn index(&mut self, doc: ProfileDocument);
    fn remove(&mut self, profile: ProfileId);
    /// Profiles matching every usable term of `query`, by id.
    fn search(&self, query: &str) -> Vec<ProfileId>;
}

/// Prefix index held in memory.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    postings: HashMap<String, BTreeSet<ProfileId>>,
    documents: HashMap<ProfileId, BTreeSet<String>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl SearchIndexer for MemoryIndex {
    fn index(&mut self, doc: ProfileDocument) {
        self.remove(doc.profile_id);
        let prefixes = doc.prefixes();
        for prefix in &prefixes {
            self.postings
                .entry(prefix.clone())
                .or_default()
                .insert(doc.profile_id);
        }
        self.documents.insert(doc.profile_id, prefixes);
    }

    fn remove(&mut self, profile: ProfileId) {
        let Some(prefixes) = self.documents.remove(&profile) else {
            return;
        };
        for prefix in prefixes {
            if let Some(ids) = self.postings.get_mut(&prefix) {
                ids.remove(&profile);
                if ids.is_empty() {
                    self.postings.remove(&prefix);
                }
            }
        }
    }

    fn search(&self, query: &str) -> Vec<ProfileId> {
        let terms: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| t.chars().count() >= SEARCH_MIN_PREFIX_LEN)
            .collect();
        let mut result: Option<BTreeSet<ProfileId>> = None;
        for term in &terms {
            let hits = self.postings.get(term).cloned().unwrap_or_default();
            result = Some(match result {
                Some(acc) => acc.intersection(&hits).copied().collect(),
                None => hits,
            });
        }
        result.map(|ids| ids.into_iter().collect()).unwrap_or_default()
    }
}

/// Rebuild `indexer` from every profile in `db`.  Returns the number of
/// documents indexed.
pub fn reindex_all<I: SearchIndexer>(db: &Database, indexer: &mut I) -> Result<u64> {
    let mut page = Page::new(1, 100);
    let mut indexed = 0;
    loop {
        let batch = db.list_profiles(page)?;
        for profile in &batch.items {
            let login = match profile.user_id {
                Some(user_id) => Some(db.get_user(user_id)?.login),
                None => None,
            };
            indexer.index(ProfileDocument::new(profile, login.as_deref()));
            indexed += 1;
        }
        if u64::from(page.page) >= batch.total_pages() {
            break;
        }
        page = Page::new(page.page + 1, page.per_page);
    }
    tracing::info!(indexed, "rebuilt profile search index");
    Ok(indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_shared::{ProfileId, RequestContext};
    use hearth_store::profiles::NewProfile;
    use hearth_store::users::NewUser;

    fn doc(id: i64, first: &str, location: &str) -> ProfileDocument {
        ProfileDocument {
            profile_id: ProfileId(id),
            location: Some(location.into()),
            about_me: None,
            first_name: Some(first.into()),
            last_name: None,
            login: None,
        }
    }

    #[test]
    fn prefixes_start_at_three_characters() {
        let d = doc(1, "Ada", "Oslo");
        let prefixes: Vec<_> = d.prefixes().into_iter().collect();
        assert_eq!(prefixes, vec!["ada", "osl", "oslo"]);
    }

    #[test]
    fn search_matches_prefixes_of_every_term() {
        let mut index = MemoryIndex::new();
        index.index(doc(1, "Ada", "Oslo"));
        index.index(doc(2, "Adam", "Bergen"));

        assert_eq!(index.search("ada"), vec![ProfileId(1), ProfileId(2)]);
        assert_eq!(index.search("ADA osl"), vec![ProfileId(1)]);
        assert!(index.search("ad").is_empty());
        assert!(index.search("zurich").is_empty());
    }

    #[test]
    fn reindexing_replaces_old_terms() {
        let mut index = MemoryIndex::new();
        index.index(doc(1, "Ada", "Oslo"));
        index.index(doc(1, "Ada", "Bergen"));
        assert!(index.search("oslo").is_empty());
        assert_eq!(index.search("berg"), vec![ProfileId(1)]);

        index.remove(ProfileId(1));
        assert!(index.is_empty());
        assert!(index.search("ada").is_empty());
    }

    #[test]
    fn reindex_all_includes_logins() {
        let db = Database::open_in_memory().unwrap();
        let ctx = RequestContext::anonymous();
        let user = db
            .create_user(
                &ctx,
                NewUser {
                    login: "stargazer".into(),
                    ..NewUser::default()
                },
            )
            .unwrap();
        let with_user = db
            .create_profile(
                &ctx,
                NewProfile {
                    user_id: Some(user.id),
                    email: "star@x.com".into(),
                    ..NewProfile::default()
                },
            )
            .unwrap();
        db.create_profile(
            &ctx,
            NewProfile {
                email: "other@x.com".into(),
                location: Some("Lisbon".into()),
                ..NewProfile::default()
            },
        )
        .unwrap();

        let mut index = MemoryIndex::new();
        assert_eq!(reindex_all(&db, &mut index).unwrap(), 2);
        assert_eq!(index.search("star"), vec![with_user.id]);
        assert_eq!(index.search("lis").len(), 1);
    }
}
