use super::{Identifier, Level2Part, PartHandle, SplitPart, ZeroDimPart};
use crate::autograd::ParamManager;
use crate::GVar;
use fastmm_utils::Shape;
use std::collections::{BTreeMap, HashMap};

/// One node of the decomposition, dispatched statically on `(level, shape)`:
/// level 2 uses closed forms, shapes with a zero entry skip recursion, and
/// everything else splits recursively.
#[derive(Debug)]
pub enum Part {
    Split(SplitPart),
    Level2(Level2Part),
    ZeroDim(ZeroDimPart),
}

impl Part {
    pub fn level(&self) -> usize {
        match self {
            Part::Split(p) => p.level,
            Part::Level2(p) => p.level,
            Part::ZeroDim(p) => p.level,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Part::Split(p) => p.shape,
            Part::Level2(p) => p.shape,
            Part::ZeroDim(p) => p.shape,
        }
    }

    pub fn identifier(&self) -> Identifier {
        match self {
            Part::Split(p) => p.identifier,
            Part::Level2(p) => p.identifier,
            Part::ZeroDim(p) => p.identifier,
        }
    }

    pub fn part_frac(&self) -> f64 {
        match self {
            Part::Split(p) => p.part_frac,
            Part::Level2(p) => p.part_frac,
            Part::ZeroDim(p) => p.part_frac,
        }
    }

    /// Additive: a part may be reached through several parents or splits.
    pub fn add_part_frac(&mut self, f: f64) {
        match self {
            Part::Split(p) => p.part_frac += f,
            Part::Level2(p) => p.part_frac += f,
            Part::ZeroDim(p) => p.part_frac += f,
        }
    }

    /// The complete split distribution on axis `t`, available after the
    /// bottom-up pass has reached this part.
    pub fn complete_split(&self, t: usize) -> &GVar {
        match self {
            Part::Split(p) => p.complete_split(t),
            Part::Level2(p) => p.complete_split(t),
            Part::ZeroDim(p) => p.complete_split(t),
        }
    }

    pub fn mat_size_contribution(&self) -> Option<&GVar> {
        match self {
            Part::Split(p) => p.mat_size_contribution(),
            Part::Level2(p) => p.mat_size_contribution(),
            Part::ZeroDim(p) => p.mat_size_contribution(),
        }
    }

    pub fn evaluate_init(&mut self, pm: &ParamManager) {
        match self {
            Part::Split(p) => p.evaluate_init(pm),
            Part::Level2(p) => p.evaluate_init(pm),
            Part::ZeroDim(p) => p.evaluate_init(pm),
        }
    }

    /// Top-down contributions to children's `part_frac`. Only splitting
    /// parts propagate; leaf variants return nothing.
    pub fn pre_contributions(&self) -> Vec<(PartHandle, f64)> {
        match self {
            Part::Split(p) => p.pre_contributions(),
            Part::Level2(_) | Part::ZeroDim(_) => Vec::new(),
        }
    }

    pub fn evaluate_post(&mut self, q: f64, registry: &PartRegistry) {
        match self {
            Part::Split(p) => p.evaluate_post(registry),
            Part::Level2(p) => p.evaluate_post(q),
            Part::ZeroDim(p) => p.evaluate_post(q),
        }
    }

    /// Seed this part's distributions from `(shape, dist)` records. Level-2
    /// records carry the scalar `split_0` as their single element; an absent
    /// record leaves the current value in place.
    pub fn set_initial(&self, pm: &mut ParamManager, seeds: &[(Shape, Vec<f64>)]) {
        match self {
            Part::Split(p) => p.set_initial(pm, seeds),
            Part::Level2(p) => {
                if let Some((_, dist)) = seeds.iter().find(|(s, _)| *s == p.shape) {
                    if let Some(&split_0) = dist.first() {
                        p.set_initial(pm, split_0);
                    }
                }
            }
            Part::ZeroDim(p) => p.set_initial(pm),
        }
    }
}

/// Arena of all parts, keyed by level. The index map memoizes creation so
/// two recursion paths reaching the same `(level, shape, identifier)` share
/// one node.
#[derive(Debug, Default)]
pub struct PartRegistry {
    levels: BTreeMap<usize, Vec<Part>>,
    index: HashMap<(usize, Shape, Identifier), usize>,
}

impl PartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> impl Iterator<Item = (usize, &[Part])> {
        self.levels.iter().map(|(&lv, v)| (lv, v.as_slice()))
    }

    pub fn level(&self, level: usize) -> &[Part] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn level_count(&self, level: usize) -> usize {
        self.levels.get(&level).map_or(0, Vec::len)
    }

    pub fn get(&self, h: PartHandle) -> &Part {
        &self.levels[&h.level][h.id]
    }

    pub fn get_mut(&mut self, h: PartHandle) -> &mut Part {
        self.levels.get_mut(&h.level).unwrap().get_mut(h.id).unwrap()
    }

    /// Detach one level's parts so they can be mutated while the rest of
    /// the registry is read (the bottom-up pass reads children one level
    /// down). Must be paired with [`put_level`](Self::put_level).
    pub fn take_level(&mut self, level: usize) -> Vec<Part> {
        self.levels.remove(&level).unwrap_or_default()
    }

    pub fn put_level(&mut self, level: usize, parts: Vec<Part>) {
        self.levels.insert(level, parts);
    }

    /// Look up the part for `(level, shape, identifier)`, building it (and
    /// transitively its children) if absent. Recursion strictly descends
    /// levels, so the claimed slot is always the last of its level.
    pub fn find_or_create(
        &mut self,
        pm: &mut ParamManager,
        level: usize,
        shape: Shape,
        identifier: Identifier,
    ) -> PartHandle {
        let key = (level, shape, identifier);
        if let Some(&id) = self.index.get(&key) {
            return PartHandle { level, id };
        }
        let id = self.levels.entry(level).or_default().len();
        self.index.insert(key, id);
        let handle = PartHandle { level, id };

        if level == 2 {
            let part = Level2Part::build(pm, id, shape, identifier);
            self.levels.get_mut(&level).unwrap().push(Part::Level2(part));
        } else if shape.contains(&0) {
            let part = ZeroDimPart::build(pm, level, id, shape, identifier);
            self.levels.get_mut(&level).unwrap().push(Part::ZeroDim(part));
        } else {
            let part = SplitPart::build(pm, level, id, shape, identifier);
            let splits = part.splits().to_vec();
            self.levels.get_mut(&level).unwrap().push(Part::Split(part));

            let mut left = [Vec::new(), Vec::new(), Vec::new()];
            let mut right = [Vec::new(), Vec::new(), Vec::new()];
            for (r, (left_r, right_r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
                for s in &splits {
                    left_r.push(self.find_or_create(pm, level - 1, s.left, (id, r)));
                    right_r.push(self.find_or_create(pm, level - 1, s.right, (id, r)));
                }
            }
            match self.get_mut(handle) {
                Part::Split(p) => p.set_children(left, right),
                _ => unreachable!(),
            }
        }
        handle
    }
}
