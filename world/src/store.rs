//! Grid-indexed storage of tiles and the objects placed on them.

use std::collections::{BTreeMap, BTreeSet};

use tile_rpg_core::{
    AttachedChain, GridCoordinate, ListenerId, ObjectBlueprint, ObjectId, PlacementError,
    TerrainKind,
};

/// Terrain and collision state of a single tile.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    terrain: TerrainKind,
    collision: bool,
    chain: Option<AttachedChain>,
}

impl Tile {
    pub(crate) fn new(terrain: TerrainKind, collision: bool, chain: Option<AttachedChain>) -> Self {
        Self {
            terrain,
            collision,
            chain,
        }
    }

    /// Tile-set entry used to draw the tile.
    #[must_use]
    pub const fn terrain(&self) -> TerrainKind {
        self.terrain
    }

    /// Reports whether the tile blocks movement.
    #[must_use]
    pub const fn has_collision(&self) -> bool {
        self.collision
    }

    /// Chain fired when the tile is touched, if any.
    #[must_use]
    pub const fn chain(&self) -> Option<&AttachedChain> {
        self.chain.as_ref()
    }
}

/// Object placed on the map.
#[derive(Clone, Debug, PartialEq)]
pub struct MapObject {
    id: ObjectId,
    name: String,
    coordinate: GridCoordinate,
    z_order: u32,
    collision: bool,
    interaction: Option<AttachedChain>,
    behavior: Option<AttachedChain>,
    insertion: u64,
}

impl MapObject {
    /// Unique identifier of the object.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Name the object was created with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tile currently occupied by the object.
    #[must_use]
    pub const fn coordinate(&self) -> GridCoordinate {
        self.coordinate
    }

    /// Draw priority; larger values are drawn in front.
    #[must_use]
    pub const fn z_order(&self) -> u32 {
        self.z_order
    }

    /// Reports whether the object blocks movement onto its tile.
    #[must_use]
    pub const fn has_collision(&self) -> bool {
        self.collision
    }

    /// Chain fired when the player interacts with the object.
    #[must_use]
    pub const fn interaction(&self) -> Option<&AttachedChain> {
        self.interaction.as_ref()
    }

    /// Autonomous chain driven by simulation ticks.
    #[must_use]
    pub const fn behavior(&self) -> Option<&AttachedChain> {
        self.behavior.as_ref()
    }
}

/// Dense tile grid plus per-coordinate object buckets.
///
/// Every stored object is listed in exactly one bucket, the one matching its
/// recorded coordinate. Listener ids are never reused, not even after the
/// object carrying them is removed. The store does not enforce collision;
/// that policy belongs to the map facade.
#[derive(Clone, Debug)]
pub(crate) struct ObjectStore {
    columns: u32,
    rows: u32,
    tiles: Vec<Tile>,
    objects: BTreeMap<ObjectId, MapObject>,
    buckets: BTreeMap<GridCoordinate, Vec<ObjectId>>,
    draw_order: Vec<ObjectId>,
    listener_ids: BTreeSet<ListenerId>,
    next_insertion: u64,
    z_dirty: bool,
}

impl ObjectStore {
    /// Creates a store from row-major tiles. The caller guarantees `tiles.len() == columns * rows`.
    pub(crate) fn new(columns: u32, rows: u32, tiles: Vec<Tile>) -> Self {
        let listener_ids = tiles
            .iter()
            .filter_map(Tile::chain)
            .map(AttachedChain::id)
            .collect();
        Self {
            columns,
            rows,
            tiles,
            objects: BTreeMap::new(),
            buckets: BTreeMap::new(),
            draw_order: Vec::new(),
            listener_ids,
            next_insertion: 0,
            z_dirty: false,
        }
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    pub(crate) fn contains(&self, coordinate: GridCoordinate) -> bool {
        coordinate.column() < self.columns && coordinate.row() < self.rows
    }

    pub(crate) fn tile_at(&self, coordinate: GridCoordinate) -> Option<&Tile> {
        self.index(coordinate).and_then(|index| self.tiles.get(index))
    }

    pub(crate) fn tiles(&self) -> impl Iterator<Item = (GridCoordinate, &Tile)> {
        let columns = self.columns.max(1);
        self.tiles.iter().enumerate().map(move |(index, tile)| {
            let index = index as u32;
            (GridCoordinate::new(index % columns, index / columns), tile)
        })
    }

    pub(crate) fn set_collision(
        &mut self,
        coordinate: GridCoordinate,
        enabled: bool,
    ) -> Result<(), PlacementError> {
        let index = self
            .index(coordinate)
            .ok_or(PlacementError::OutOfBounds(coordinate))?;
        let tile = self
            .tiles
            .get_mut(index)
            .ok_or(PlacementError::OutOfBounds(coordinate))?;
        tile.collision = enabled;
        Ok(())
    }

    pub(crate) fn object(&self, id: ObjectId) -> Option<&MapObject> {
        self.objects.get(&id)
    }

    pub(crate) fn objects(&self) -> impl Iterator<Item = &MapObject> {
        self.objects.values()
    }

    /// Objects occupying the coordinate in insertion order.
    pub(crate) fn objects_at(&self, coordinate: GridCoordinate) -> impl Iterator<Item = &MapObject> {
        self.buckets
            .get(&coordinate)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.objects.get(id))
    }

    pub(crate) fn insert_object(
        &mut self,
        blueprint: ObjectBlueprint,
        coordinate: GridCoordinate,
    ) -> Result<(), PlacementError> {
        if !self.contains(coordinate) {
            return Err(PlacementError::OutOfBounds(coordinate));
        }
        if self.objects.contains_key(&blueprint.id) {
            return Err(PlacementError::DuplicateObject(blueprint.id));
        }
        let attached: Vec<ListenerId> = [&blueprint.interaction, &blueprint.behavior]
            .into_iter()
            .flatten()
            .map(AttachedChain::id)
            .collect();
        for (index, id) in attached.iter().enumerate() {
            if self.listener_ids.contains(id) || attached[..index].contains(id) {
                return Err(PlacementError::DuplicateListener(*id));
            }
        }
        self.listener_ids.extend(attached);

        let insertion = self.next_insertion;
        self.next_insertion = self.next_insertion.saturating_add(1);
        let object = MapObject {
            id: blueprint.id,
            name: blueprint.name,
            coordinate,
            z_order: 0,
            collision: blueprint.collision,
            interaction: blueprint.interaction,
            behavior: blueprint.behavior,
            insertion,
        };
        self.buckets.entry(coordinate).or_default().push(object.id);
        self.draw_order.push(object.id);
        let _ = self.objects.insert(object.id, object);
        self.z_dirty = true;
        Ok(())
    }

    pub(crate) fn remove_object(&mut self, id: ObjectId) -> Result<MapObject, PlacementError> {
        let object = self
            .objects
            .remove(&id)
            .ok_or(PlacementError::ObjectNotFound(id))?;
        self.detach_from_bucket(id, object.coordinate);
        self.draw_order.retain(|candidate| *candidate != id);
        Ok(object)
    }

    /// Relocates an object recorded at `from` to `to`.
    ///
    /// Fails without mutation when the object is absent, is not recorded at
    /// `from`, or `to` lies outside the grid.
    pub(crate) fn move_object(
        &mut self,
        id: ObjectId,
        from: GridCoordinate,
        to: GridCoordinate,
    ) -> Result<(), PlacementError> {
        if !self.contains(to) {
            return Err(PlacementError::OutOfBounds(to));
        }
        let object = self
            .objects
            .get_mut(&id)
            .filter(|object| object.coordinate == from)
            .ok_or(PlacementError::ObjectNotFound(id))?;
        object.coordinate = to;

        self.detach_from_bucket(id, from);
        self.buckets.entry(to).or_default().push(id);
        self.z_dirty = true;
        Ok(())
    }

    pub(crate) fn is_z_order_dirty(&self) -> bool {
        self.z_dirty
    }

    /// Orders objects back to front by row, ties broken by insertion order.
    pub(crate) fn recompute_z_order(&mut self) -> &[ObjectId] {
        let objects = &self.objects;
        self.draw_order.sort_by_key(|id| {
            objects
                .get(id)
                .map_or((u32::MAX, u64::MAX), |object| {
                    (object.coordinate.row(), object.insertion)
                })
        });
        for (depth, id) in self.draw_order.iter().enumerate() {
            if let Some(object) = self.objects.get_mut(id) {
                object.z_order = depth as u32;
            }
        }
        self.z_dirty = false;
        &self.draw_order
    }

    pub(crate) fn draw_order(&self) -> &[ObjectId] {
        &self.draw_order
    }

    pub(crate) fn has_listener(&self, id: ListenerId) -> bool {
        self.listener_ids.contains(&id)
    }

    fn detach_from_bucket(&mut self, id: ObjectId, coordinate: GridCoordinate) {
        let emptied = match self.buckets.get_mut(&coordinate) {
            Some(bucket) => {
                bucket.retain(|candidate| *candidate != id);
                bucket.is_empty()
            }
            None => false,
        };
        if emptied {
            let _ = self.buckets.remove(&coordinate);
        }
    }

    fn index(&self, coordinate: GridCoordinate) -> Option<usize> {
        if self.contains(coordinate) {
            let row = usize::try_from(coordinate.row()).ok()?;
            let column = usize::try_from(coordinate.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}
