//! Nested sequence offsets (LoD).
//!
//! A [`Lod`] describes a batch of variable-length sequences. Level 0 is the
//! coarsest partition; each deeper level refines the segments of its parent,
//! so the last offset of level `i` is the number of segments in level `i + 1`.
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lod {
    levels: Vec<Vec<usize>>,
}

impl Lod {
    pub fn new(levels: Vec<Vec<usize>>) -> Result<Self> {
        let lod = Self { levels };
        lod.validate()?;
        Ok(lod)
    }

    /// Single-level table whose segments have the given lengths.
    pub fn from_lengths(lengths: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        offsets.push(0);
        let mut acc = 0;
        for len in lengths {
            acc += len;
            offsets.push(acc);
        }
        Self {
            levels: vec![offsets],
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (idx, level) in self.levels.iter().enumerate() {
            check_level(level).map_err(|err| anyhow!("lod level {}: {}", idx, err))?;
        }
        for (idx, pair) in self.levels.windows(2).enumerate() {
            let last = pair[0].last().copied().unwrap_or_default();
            if last != pair[1].len() - 1 {
                return Err(anyhow!(
                    "lod level {} ends at {} but level {} has {} segments",
                    idx,
                    last,
                    idx + 1,
                    pair[1].len() - 1
                ));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    pub fn level(&self, level: usize) -> Option<&[usize]> {
        self.levels.get(level).map(Vec::as_slice)
    }

    fn require_level(&self, level: usize) -> Result<&[usize]> {
        self.level(level)
            .ok_or_else(|| anyhow!("lod has {} levels, asked for {}", self.depth(), level))
    }

    pub fn segment_lengths(&self, level: usize) -> Result<Vec<usize>> {
        let offsets = self.require_level(level)?;
        Ok(offsets.windows(2).map(|pair| pair[1] - pair[0]).collect())
    }

    pub fn num_sequences(&self, level: usize) -> Result<usize> {
        Ok(self.require_level(level)?.len() - 1)
    }

    /// Number of elements spanned by `level`, i.e. its last offset.
    pub fn total(&self, level: usize) -> Result<usize> {
        Ok(self
            .require_level(level)?
            .last()
            .copied()
            .unwrap_or_default())
    }
}

fn check_level(offsets: &[usize]) -> Result<()> {
    match offsets.first() {
        None => return Err(anyhow!("offsets are empty")),
        Some(0) => {}
        Some(first) => return Err(anyhow!("offsets start at {} instead of 0", first)),
    }
    if let Some(pos) = offsets.windows(2).position(|pair| pair[1] < pair[0]) {
        return Err(anyhow!(
            "offsets decrease at index {}: {} -> {}",
            pos + 1,
            offsets[pos],
            offsets[pos + 1]
        ));
    }
    Ok(())
}

/// Output layout of a match-matrix interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchMatrixLod {
    /// Start of every batch element's block in the flat output.
    pub top_offset: Vec<usize>,
    pub lod: Lod,
}

impl MatchMatrixLod {
    /// Elements in the flat output.
    pub fn output_len(&self) -> usize {
        self.top_offset.last().copied().unwrap_or_default()
    }
}

/// Derive the output offsets of a match-matrix interaction from the level-0
/// offsets of its left and right inputs.
///
/// Batch `b` yields `dim_t` channels of a `len_l x len_r` matrix. Level 0 has
/// one segment of `dim_t` per batch, level 1 one segment of `len_l` per
/// channel, and level 2 one segment of `len_r` per left position.
pub fn match_matrix_lod(left: &[usize], right: &[usize], dim_t: usize) -> Result<MatchMatrixLod> {
    check_level(left).map_err(|err| anyhow!("left offsets: {}", err))?;
    check_level(right).map_err(|err| anyhow!("right offsets: {}", err))?;
    if left.len() != right.len() {
        return Err(anyhow!(
            "batch size mismatch: left has {} sequences, right has {}",
            left.len() - 1,
            right.len() - 1
        ));
    }
    if dim_t == 0 {
        return Err(anyhow!("channel count must be positive"));
    }

    let batch = left.len() - 1;
    let total_left = left[batch];
    let mut top_offset = vec![0usize; batch + 1];
    let mut lod0 = vec![0usize; batch + 1];
    let mut lod1 = vec![0usize; batch * dim_t + 1];
    let mut lod2 = vec![0usize; total_left * dim_t + 1];

    for i in 0..batch {
        let len_l = left[i + 1] - left[i];
        let len_r = right[i + 1] - right[i];
        top_offset[i + 1] = top_offset[i] + dim_t * len_l * len_r;
        lod0[i + 1] = lod0[i] + dim_t;
        for j in 0..dim_t {
            let row = i * dim_t + j;
            lod1[row + 1] = lod1[row] + len_l;
            for k in 0..len_l {
                let idx = left[i] * dim_t + j * len_l + k;
                lod2[idx + 1] = lod2[idx] + len_r;
            }
        }
    }

    let lod = Lod::new(vec![lod0, lod1, lod2])?;
    let deepest = lod.total(2)?;
    if deepest != top_offset[batch] {
        return Err(anyhow!(
            "derived offsets span {} elements, expected {}",
            deepest,
            top_offset[batch]
        ));
    }
    Ok(MatchMatrixLod { top_offset, lod })
}
