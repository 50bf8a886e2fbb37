//! Annotation placement for one staff of one score line
//!
//! Each side of the staff gets a fresh [`RectTable`]. Above and below, the
//! table is seeded with the solved group and tuplet boxes. Annotations are
//! then stacked tier by tier in the configured order; within a tier they are
//! placed in X order. Aligned sets are squeezed and placed as one batch when
//! their earliest tier comes up, even if some members belong to later tiers.
//! Every lyric verse, the pedal marks and the endings also form batches.
//!
//! Distances and sizes come from the parameters in effect at each item's own
//! measure. Stacking orders and the squeeze floor are per line.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::context::SolveContext;
use crate::diagnostics::{LayoutWarning, WarningCategory};
use crate::error::{InputLocation, LayoutError};
use crate::fonts::Font;
use crate::geometry::{HALF_STAFF_STEPS, STDPAD};
use crate::model::{
    AlignTag, Group, GroupContent, GroupId, Justify, MarkType, MeasureId, Place, Placement, Score,
    StaffNo, Stuff, StuffContent, TupletRole,
};
use crate::params::{MeasureParams, ParamName};

use super::align::{squeeze, AlignedItem};
use super::order::StackOrder;
use super::rectab::{RectTable, Span};

/// Height of a hairpin wedge, in steps
const HAIRPIN_STEPS: f64 = 2.0;
/// Height reserved for a tie or slur, in steps
const CURVE_STEPS: f64 = 1.5;
/// Spacing of chord grid lines, in steps
const GRID_CELL_STEPS: f64 = 1.0;
/// Vertical hook of an ending bracket, in steps
const ENDING_HOOK_STEPS: f64 = 2.0;

/// Vertical room a staff needs on each side after placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaffExtents {
    /// Distance above the center line
    pub north: f64,
    /// Distance below the center line
    pub south: f64,
    /// Height of the between-staff region under this staff
    pub between: f64,
}

/// Where an item came from, for writing its placement back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Stuff(MeasureId, usize),
    Syllable(GroupId),
}

/// Items that share one level regardless of alignment tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Batch {
    Verse(u8),
    Pedal,
    Ending,
}

/// An annotation measured and ready to stack
#[derive(Debug, Clone)]
struct Item {
    source: Source,
    kind: MarkType,
    anchor: f64,
    west: f64,
    east: f64,
    height: f64,
    extender: f64,
    clearance: f64,
    forced: Option<f64>,
    align: Option<AlignTag>,
    batch: Option<Batch>,
    location: InputLocation,
}

#[derive(Debug, Clone)]
enum Unit {
    Single(usize),
    Forced(usize),
    Aligned(Vec<usize>),
    Batch(Batch, Vec<usize>),
}

impl Unit {
    fn members(&self) -> Vec<usize> {
        match self {
            Unit::Single(i) | Unit::Forced(i) => vec![*i],
            Unit::Aligned(v) | Unit::Batch(_, v) => v.clone(),
        }
    }
}

fn order_param(place: Place) -> ParamName {
    match place {
        Place::Above => ParamName::AboveOrder,
        Place::Below => ParamName::BelowOrder,
        Place::Between => ParamName::BetweenOrder,
    }
}

fn dist_param(kind: MarkType) -> ParamName {
    match kind {
        MarkType::Dynamic => ParamName::DynDist,
        MarkType::Chord | MarkType::Grid => ParamName::ChordDist,
        MarkType::Lyrics => ParamName::LyricsDist,
        _ => ParamName::Dist,
    }
}

/// Place every annotation of one staff on one score line
///
/// `ctx` is the line's context; per-item parameters are read from `params`
/// at the item's measure.
pub fn place_staff(
    score: &mut Score,
    ctx: &SolveContext<'_>,
    params: &dyn MeasureParams,
    line: usize,
    staff: StaffNo,
    warnings: &mut Vec<LayoutWarning>,
) -> Result<StaffExtents, LayoutError> {
    let measures = score.measures_of(line, staff);
    let half = HALF_STAFF_STEPS * ctx.step();
    let mut extents = StaffExtents {
        north: half,
        south: half,
        between: 0.0,
    };

    for place in [Place::Above, Place::Below, Place::Between] {
        let mut table = match place {
            Place::Between => RectTable::between(score.page_width),
            Place::Above | Place::Below => {
                let mut table = RectTable::new(place);
                seed_groups(score, &measures, &mut table)?;
                table
            }
        };
        let items = collect_items(score, ctx, params, &measures, place, &table)?;
        let order = ctx.params.order(staff, order_param(place));
        let min_scale = ctx.number(None, ParamName::AlignMinScale);
        let placements = stack_items(&mut table, &items, &order, min_scale, warnings);
        write_back(score, &items, &placements)?;

        debug!(
            "line {} staff {} {:?}: {} items, outermost {:.3}",
            line,
            staff.0,
            place,
            items.len(),
            table.outermost()
        );
        match place {
            Place::Above => extents.north = extents.north.max(table.outermost()),
            Place::Below => extents.south = extents.south.max(table.outermost()),
            Place::Between => extents.between = table.outermost(),
        }
    }
    Ok(extents)
}

/// Seed solved group boxes and tuplet brackets as obstacles
fn seed_groups(
    score: &Score,
    measures: &[MeasureId],
    table: &mut RectTable,
) -> Result<(), LayoutError> {
    for &mid in measures {
        for id in score.measure(mid)?.all_groups() {
            let group = score.get(id)?;
            if matches!(group.content, GroupContent::Notes | GroupContent::Rest) {
                table.seed(&group.extent());
            }
            let opens_tuplet = group
                .tuplet
                .as_ref()
                .is_some_and(|t| matches!(t.role, TupletRole::Start | TupletRole::Lone));
            if let (true, Some(geometry)) = (opens_tuplet, group.tuplet_geometry) {
                table.seed(&geometry.extent());
            }
        }
    }
    Ok(())
}

fn collect_items(
    score: &Score,
    ctx: &SolveContext<'_>,
    params: &dyn MeasureParams,
    measures: &[MeasureId],
    place: Place,
    table: &RectTable,
) -> Result<Vec<Item>, LayoutError> {
    let step = ctx.step();
    let base = match place {
        Place::Above | Place::Below => HALF_STAFF_STEPS * step,
        Place::Between => 0.0,
    };
    let mut items = Vec::new();

    for &mid in measures {
        let measure = score.measure(mid)?;
        let number = |name: ParamName| params.at(mid).number(ctx.staff, None, name);
        for (index, stuff) in measure.stuff.iter().enumerate() {
            if stuff.place != place {
                continue;
            }
            let size = number(ParamName::Size);
            let Some(mut item) = measure_stuff(score, ctx, stuff, size, table)? else {
                continue;
            };
            item.source = Source::Stuff(mid, index);
            if stuff.kind != MarkType::Curve {
                let default_dist = match place {
                    Place::Between => 0.0,
                    Place::Above | Place::Below => number(dist_param(stuff.kind)),
                };
                let dist = stuff.dist.map(|d| d.steps).unwrap_or(default_dist);
                item.clearance = base + dist * step;
            }
            if let Some(d) = stuff.dist.filter(|d| d.forced) {
                item.forced = Some(base + d.steps * step);
            }
            items.push(item);
        }
    }

    items.extend(collect_syllables(score, ctx, params, measures, place, base)?);
    Ok(items)
}

/// Measure one annotation's box; clearance is filled in by the caller
fn measure_stuff(
    score: &Score,
    ctx: &SolveContext<'_>,
    stuff: &Stuff,
    size: f64,
    table: &RectTable,
) -> Result<Option<Item>, LayoutError> {
    let step = ctx.step();
    let fonts = ctx.fonts;
    let x = stuff.start_x;
    let end = stuff.end_x.unwrap_or(x);
    let mut clearance = 0.0;
    let mut extender = 0.0;

    let (west, east, height) = match &stuff.content {
        StuffContent::Text {
            text,
            font,
            size: text_size,
            justify,
            extender: tail,
        } => {
            let size = text_size.unwrap_or(size);
            let width = fonts.width(*font, size, text) + tail;
            extender = *tail;
            let west = match justify {
                Justify::Left => x,
                Justify::Center => x - width / 2.0,
                Justify::Right => x - width,
            };
            (west, (west + width).max(end), fonts.height(*font, size, text))
        }
        StuffContent::Hairpin => (x, end, HAIRPIN_STEPS * step),
        StuffContent::Pedal(mark) => {
            let glyph = mark.glyph();
            let width = fonts.width(Font::Music, size, glyph);
            (x, x + width, fonts.height(Font::Music, size, glyph))
        }
        StuffContent::Ending { label } => {
            let label_height = fonts.height(Font::Roman, size, label);
            let width = fonts.width(Font::Roman, size, label) + 2.0 * STDPAD;
            (
                x,
                end.max(x + width),
                label_height.max(ENDING_HOOK_STEPS * step) + STDPAD,
            )
        }
        StuffContent::Rehearsal { label } => {
            let width = fonts.width(Font::Bold, size, label) + 4.0 * STDPAD;
            (x, x + width, fonts.height(Font::Bold, size, label) + 4.0 * STDPAD)
        }
        StuffContent::Grid {
            name,
            strings,
            frets,
        } => {
            let cell = GRID_CELL_STEPS * step;
            let grid_width = f64::from(strings.saturating_sub(1)) * cell;
            let width = grid_width.max(fonts.width(Font::Roman, size, name));
            let height = f64::from(*frets) * cell + fonts.height(Font::Roman, size, name) + STDPAD;
            (x - width / 2.0, x + width / 2.0, height)
        }
        StuffContent::Curve { from, to } => {
            let (a, b) = (score.get(*from)?, score.get(*to)?);
            let end_height = |g: &Group| table.to_distance(g.north, g.south).1;
            clearance = end_height(a).max(end_height(b)) + STDPAD;
            (a.x.min(b.x), a.x.max(b.x), CURVE_STEPS * step)
        }
    };
    if east < west {
        return Ok(None);
    }

    Ok(Some(Item {
        source: Source::Stuff(MeasureId(0), 0),
        kind: stuff.kind,
        anchor: x,
        west,
        east,
        height,
        extender,
        clearance,
        forced: None,
        align: stuff.align,
        batch: match stuff.kind {
            MarkType::Pedal => Some(Batch::Pedal),
            MarkType::Ending => Some(Batch::Ending),
            _ => None,
        },
        location: stuff.location.clone(),
    }))
}

/// Syllables centered on their group, one uniform box height per verse
fn collect_syllables(
    score: &Score,
    ctx: &SolveContext<'_>,
    params: &dyn MeasureParams,
    measures: &[MeasureId],
    place: Place,
    base: f64,
) -> Result<Vec<Item>, LayoutError> {
    let mut items = Vec::new();
    let mut ascent: BTreeMap<u8, f64> = BTreeMap::new();
    let mut descent: BTreeMap<u8, f64> = BTreeMap::new();

    for &mid in measures {
        let resolver = params.at(mid);
        let size = resolver.number(ctx.staff, None, ParamName::LyricsSize);
        let dist = match place {
            Place::Between => 0.0,
            Place::Above | Place::Below => resolver.number(ctx.staff, None, ParamName::LyricsDist),
        };
        for &id in &score.measure(mid)?.lyrics {
            let group = score.get(id)?;
            let Some(syllable) = group.syllable.as_ref().filter(|s| s.place == place) else {
                continue;
            };
            let size = syllable.size.unwrap_or(size);
            let width = ctx.fonts.width(syllable.font, size, &syllable.text);
            let a = ascent.entry(syllable.verse).or_insert(0.0);
            *a = a.max(ctx.fonts.ascent(syllable.font, size, &syllable.text));
            let d = descent.entry(syllable.verse).or_insert(0.0);
            *d = d.max(ctx.fonts.descent(syllable.font, size, &syllable.text));
            items.push(Item {
                source: Source::Syllable(id),
                kind: MarkType::Lyrics,
                anchor: group.x,
                west: group.x - width / 2.0,
                east: group.x + width / 2.0,
                height: 0.0,
                extender: 0.0,
                clearance: base + dist * ctx.step(),
                forced: None,
                align: None,
                batch: Some(Batch::Verse(syllable.verse)),
                location: group.location.clone(),
            });
        }
    }
    for item in &mut items {
        if let Some(Batch::Verse(verse)) = item.batch {
            item.height = ascent.get(&verse).copied().unwrap_or(0.0)
                + descent.get(&verse).copied().unwrap_or(0.0);
        }
    }
    Ok(items)
}

/// Unforced aligned items of one side, by tag
fn aligned_sets(items: &[Item]) -> BTreeMap<AlignTag, Vec<usize>> {
    let mut sets: BTreeMap<AlignTag, Vec<usize>> = BTreeMap::new();
    for (i, item) in items.iter().enumerate() {
        if let (None, Some(tag)) = (item.forced, item.align) {
            sets.entry(tag).or_default().push(i);
        }
    }
    sets
}

/// Group one tier's items into placement units
///
/// An aligned set is emitted whole the first time any member's tier comes up.
fn form_units(
    items: &[Item],
    members: &[usize],
    sets: &BTreeMap<AlignTag, Vec<usize>>,
    placed_tags: &mut BTreeSet<AlignTag>,
) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut batches: BTreeMap<Batch, Vec<usize>> = BTreeMap::new();
    for &i in members {
        let item = &items[i];
        if item.forced.is_some() {
            units.push(Unit::Forced(i));
        } else if let Some(tag) = item.align {
            if placed_tags.insert(tag) {
                let set = sets.get(&tag).cloned().unwrap_or_else(|| vec![i]);
                units.push(Unit::Aligned(set));
            }
        } else if let Some(batch) = item.batch {
            batches.entry(batch).or_default().push(i);
        } else {
            units.push(Unit::Single(i));
        }
    }
    units.extend(batches.into_iter().map(|(b, v)| Unit::Batch(b, v)));
    units
}

/// Sort key: verses go in verse order, nearest the staff first
fn unit_key(unit: &Unit, items: &[Item], place: Place) -> (u16, f64) {
    let west = unit
        .members()
        .iter()
        .map(|&i| items[i].west)
        .fold(f64::INFINITY, f64::min);
    let rank = match unit {
        Unit::Batch(Batch::Verse(verse), _) => match place {
            Place::Above => 1 + u16::from(u8::MAX - verse),
            Place::Below | Place::Between => 1 + u16::from(*verse),
        },
        _ => 0,
    };
    (rank, west)
}

fn stack_items(
    table: &mut RectTable,
    items: &[Item],
    order: &StackOrder,
    min_scale: f64,
    warnings: &mut Vec<LayoutWarning>,
) -> Vec<Option<Placement>> {
    let mut placements = vec![None; items.len()];
    let place = table.place();
    let sets = aligned_sets(items);
    let mut placed_tags = BTreeSet::new();
    for tier in order.tiers() {
        let members: Vec<usize> = (0..items.len())
            .filter(|&i| tier.contains(&items[i].kind))
            .collect();
        if members.is_empty() {
            continue;
        }
        let mut units = form_units(items, &members, &sets, &mut placed_tags);
        units.sort_by(|a, b| {
            let (ka, kb) = (unit_key(a, items, place), unit_key(b, items, place));
            ka.0.cmp(&kb.0).then(ka.1.total_cmp(&kb.1))
        });
        for unit in units {
            place_unit(table, items, &unit, min_scale, warnings, &mut placements);
        }
    }
    placements
}

fn place_unit(
    table: &mut RectTable,
    items: &[Item],
    unit: &Unit,
    min_scale: f64,
    warnings: &mut Vec<LayoutWarning>,
    placements: &mut [Option<Placement>],
) {
    let mut record = |table: &RectTable, i: usize, distance: f64, west: f64, east: f64, scale: f64| {
        let (north, south) = table.to_bounds(distance, items[i].height);
        placements[i] = Some(Placement {
            west,
            east,
            north,
            south,
            scale,
        });
    };

    match unit {
        Unit::Single(i) => {
            let item = &items[*i];
            let d = table.stack_one(item.west, item.east, item.height, item.clearance);
            record(table, *i, d, item.west, item.east, 1.0);
        }
        Unit::Forced(i) => {
            let item = &items[*i];
            let distance = item.forced.unwrap_or(item.clearance);
            let d = table.place_at(&[Span::new(item.west, item.east, item.height)], distance);
            record(table, *i, d, item.west, item.east, 1.0);
        }
        Unit::Batch(_, members) => {
            let spans: Vec<Span> = members
                .iter()
                .map(|&i| Span::new(items[i].west, items[i].east, items[i].height))
                .collect();
            let clearance = unit_clearance(items, members);
            let d = table.stack_group(&spans, clearance);
            for &i in members {
                record(table, i, d, items[i].west, items[i].east, 1.0);
            }
        }
        Unit::Aligned(members) => {
            let mut sorted = members.clone();
            sorted.sort_by(|&a, &b| items[a].anchor.total_cmp(&items[b].anchor));
            let aligned: Vec<AlignedItem> = sorted
                .iter()
                .map(|&i| {
                    let item = &items[i];
                    AlignedItem::new(item.anchor, item.anchor - item.west, item.east - item.anchor)
                        .with_extender(item.extender)
                })
                .collect();
            let squeezed = squeeze(aligned, min_scale);
            if squeezed.hit_floor {
                let location = sorted.first().map(|&i| &items[i].location);
                warnings.push(LayoutWarning::new(
                    WarningCategory::Squeeze,
                    location,
                    format!("aligned marks squeezed to the minimum scale {:.2}", min_scale),
                ));
            }
            let spans: Vec<Span> = sorted
                .iter()
                .zip(&squeezed.items)
                .map(|(&i, a)| Span::new(a.west(), a.east(), items[i].height))
                .collect();
            let d = table.stack_group(&spans, unit_clearance(items, &sorted));
            for (&i, a) in sorted.iter().zip(&squeezed.items) {
                record(table, i, d, a.west(), a.east(), a.scale);
            }
        }
    }
}

fn unit_clearance(items: &[Item], members: &[usize]) -> f64 {
    members
        .iter()
        .map(|&i| items[i].clearance)
        .fold(f64::NEG_INFINITY, f64::max)
}

fn write_back(
    score: &mut Score,
    items: &[Item],
    placements: &[Option<Placement>],
) -> Result<(), LayoutError> {
    for (item, placement) in items.iter().zip(placements) {
        let Some(placement) = placement else {
            continue;
        };
        match item.source {
            Source::Stuff(mid, index) => {
                let measure = score.measure_mut(mid)?;
                let stuff = measure.stuff.get_mut(index).ok_or_else(|| {
                    LayoutError::internal(format!("stuff {} missing from measure {}", index, mid.0))
                })?;
                stuff.placement = Some(*placement);
            }
            Source::Syllable(id) => {
                let group = score.get_mut(id)?;
                group.north = placement.north;
                group.south = placement.south;
                group.west = placement.west - group.x;
                group.east = placement.east - group.x;
            }
        }
    }
    Ok(())
}
