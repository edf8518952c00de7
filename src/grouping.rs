//! Partition of matching pairs into duplicate groups.
//!
//! Groups are the connected components of the graph whose edges are the
//! sub-threshold pairs. The first member added to a group is its
//! representative and the only one not marked for removal.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::record::{ImageRecord, PairScore};

/// A set of images that are near-duplicates of each other, directly or
/// through a chain of matches.
#[derive(Debug, Clone)]
pub struct Group {
    members: Vec<ImageRecord>,
    index: HashSet<PathBuf>,
}

impl Group {
    fn from_pair(a: &ImageRecord, b: &ImageRecord) -> Self {
        let mut group = Self {
            members: Vec::with_capacity(2),
            index: HashSet::with_capacity(2),
        };
        group.insert(a);
        group.insert(b);
        group
    }

    fn insert(&mut self, record: &ImageRecord) {
        if self.index.insert(record.path().to_path_buf()) {
            self.members.push(record.clone());
        }
    }

    fn absorb(&mut self, other: Group) {
        for record in other.members {
            if self.index.insert(record.path().to_path_buf()) {
                self.members.push(record);
            }
        }
    }

    fn touches(&self, pair: &PairScore) -> bool {
        self.contains(pair.a.path()) || self.contains(pair.b.path())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains(path)
    }

    /// Members in the order they joined the group.
    pub fn members(&self) -> &[ImageRecord] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The member kept when duplicates are removed.
    pub fn representative(&self) -> Option<&ImageRecord> {
        self.members.iter().find(|r| !r.marked_for_removal)
    }

    pub fn marked_for_removal(&self) -> impl Iterator<Item = &ImageRecord> {
        self.members.iter().filter(|r| r.marked_for_removal)
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.members.iter().map(ImageRecord::path)
    }

    /// Change the removal flag of one member. Returns false if `path` is not
    /// in this group.
    pub fn set_marked(&mut self, path: &Path, marked: bool) -> bool {
        match self.members.iter_mut().find(|r| r.path() == path) {
            Some(record) => {
                record.marked_for_removal = marked;
                true
            }
            None => false,
        }
    }

    fn mark_representative(&mut self) {
        for (i, record) in self.members.iter_mut().enumerate() {
            record.marked_for_removal = i != 0;
        }
    }
}

/// Group pairs that already passed the threshold filter.
///
/// Pairs are merged in input order: a pair touching no group starts a new
/// one, a pair touching one group joins it, and a pair touching several
/// merges them all into the earliest. Every record that appears in a pair
/// ends up in exactly one group; records in no pair appear in none.
pub fn group_pairs(pairs: &[PairScore]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();

    for pair in pairs {
        let matches: Vec<usize> = groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.touches(pair))
            .map(|(i, _)| i)
            .collect();

        match matches.split_first() {
            None => groups.push(Group::from_pair(&pair.a, &pair.b)),
            Some((&first, rest)) => {
                // Remove back to front so earlier indices stay valid.
                for &i in rest.iter().rev() {
                    let merged = groups.remove(i);
                    groups[first].absorb(merged);
                }
                groups[first].insert(&pair.a);
                groups[first].insert(&pair.b);
            }
        }
    }

    for group in &mut groups {
        group.mark_representative();
    }
    log::debug!("Built {} groups from {} pairs", groups.len(), pairs.len());
    groups
}
