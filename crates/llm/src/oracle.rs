//! Generative oracles.
//!
//! [`GenerativeOracle`] is the step-wise contract the decode loop drives.
//! [`CausalLm`] owns an ONNX decoder session; each prompt gets its own
//! [`OnnxGenerator`], which carries the KV cache between steps: the prompt is
//! fed once, then only the newest token, with the previous step's `present.*`
//! outputs fed back as `past_key_values.*`.

use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;
use runtime::{acquire, open_session, Availability, ExecutionProvider};
use std::borrow::Cow;
use tracing::{debug, info};

use crate::config::{layer_name, GenaiConfig, GenerationConfig};
use crate::sampler::Sampler;
use crate::{LlmError, SearchOptions};

/// Stateful, step-wise token generator.
pub trait GenerativeOracle {
    /// Appends prompt tokens. They are consumed by the next [`step`](Self::step).
    fn append_tokens(&mut self, ids: &[u32]) -> Result<(), LlmError>;

    /// Runs one decode iteration and appends exactly one new token.
    fn step(&mut self) -> Result<(), LlmError>;

    /// Natural end token emitted or the length cap reached.
    fn is_done(&self) -> bool;

    /// Prompt plus everything generated so far.
    fn sequence(&self) -> &[u32];

    fn newest_token(&self) -> Option<u32> {
        self.sequence().last().copied()
    }
}

/// Token bookkeeping shared by generators: what was fed, what is pending,
/// when to stop.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    tokens: Vec<u32>,
    pending: usize,
    generated: usize,
    max_length: usize,
    eos: Vec<u32>,
}

impl SequenceTracker {
    pub fn new(max_length: usize, eos: Vec<u32>) -> Self {
        Self {
            tokens: Vec::new(),
            pending: 0,
            generated: 0,
            max_length,
            eos,
        }
    }

    pub fn append(&mut self, ids: &[u32]) -> Result<(), LlmError> {
        if ids.is_empty() {
            return Err(LlmError::InvalidInput("no tokens to append".into()));
        }
        if self.generated > 0 && self.is_done() {
            return Err(LlmError::InvalidState(
                "cannot append to a finished sequence".into(),
            ));
        }
        let total = self.tokens.len() + ids.len();
        if total > self.max_length {
            return Err(LlmError::InvalidInput(format!(
                "sequence of {total} tokens exceeds max_length {}",
                self.max_length
            )));
        }
        self.tokens.extend_from_slice(ids);
        self.pending += ids.len();
        Ok(())
    }

    /// Tokens the model has not seen yet.
    pub fn pending(&self) -> &[u32] {
        &self.tokens[self.tokens.len() - self.pending..]
    }

    /// Guard run before every step.
    pub fn ensure_can_step(&self) -> Result<(), LlmError> {
        if self.is_done() {
            return Err(LlmError::InvalidState("generation already finished".into()));
        }
        if self.pending == 0 {
            return Err(LlmError::InvalidState(
                "no tokens appended before step".into(),
            ));
        }
        Ok(())
    }

    /// Records a sampled token; it becomes the only pending token.
    pub fn push_generated(&mut self, id: u32) {
        self.tokens.push(id);
        self.generated += 1;
        self.pending = 1;
    }

    pub fn is_done(&self) -> bool {
        if self.tokens.len() >= self.max_length {
            return true;
        }
        self.generated > 0
            && self
                .tokens
                .last()
                .is_some_and(|last| self.eos.contains(last))
    }

    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    pub fn generated(&self) -> usize {
        self.generated
    }
}

/// One `[1, kv_heads, seq, head_size]` cache tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheTensor {
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

impl CacheTensor {
    pub fn empty(kv_heads: usize, head_size: usize) -> Self {
        Self {
            shape: [1, kv_heads, 0, head_size],
            data: Vec::new(),
        }
    }

    pub fn from_output(dims: &[i64], data: &[f32]) -> Result<Self, LlmError> {
        let shape: [usize; 4] = match dims {
            [a, b, c, d] if dims.iter().all(|v| *v >= 0) => {
                [*a as usize, *b as usize, *c as usize, *d as usize]
            }
            _ => {
                return Err(LlmError::Inference(format!(
                    "expected a rank-4 cache tensor, got shape {dims:?}"
                )))
            }
        };
        if shape.iter().product::<usize>() != data.len() {
            return Err(LlmError::Inference(format!(
                "cache tensor shape {shape:?} does not match {} values",
                data.len()
            )));
        }
        Ok(Self {
            shape,
            data: data.to_vec(),
        })
    }

    pub fn seq_len(&self) -> usize {
        self.shape[2]
    }
}

/// Per-layer key/value cache.
#[derive(Debug, Clone, PartialEq)]
pub struct KvCache {
    layers: Vec<(CacheTensor, CacheTensor)>,
    num_layers: usize,
}

impl KvCache {
    pub fn empty(num_layers: usize, kv_heads: usize, head_size: usize) -> Self {
        let layers = (0..num_layers)
            .map(|_| {
                (
                    CacheTensor::empty(kv_heads, head_size),
                    CacheTensor::empty(kv_heads, head_size),
                )
            })
            .collect();
        Self { layers, num_layers }
    }

    /// Positions already held in the cache.
    pub fn seq_len(&self) -> usize {
        self.layers.first().map_or(0, |(key, _)| key.seq_len())
    }

    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    pub fn layer(&self, idx: usize) -> Option<&(CacheTensor, CacheTensor)> {
        self.layers.get(idx)
    }

    /// Moves every layer out, leaving the cache empty until [`replace`](Self::replace).
    pub fn take_layers(&mut self) -> Vec<(CacheTensor, CacheTensor)> {
        std::mem::take(&mut self.layers)
    }

    pub fn replace(&mut self, layers: Vec<(CacheTensor, CacheTensor)>) -> Result<(), LlmError> {
        if layers.len() != self.num_layers {
            return Err(LlmError::Inference(format!(
                "model returned {} cache layers, expected {}",
                layers.len(),
                self.num_layers
            )));
        }
        self.layers = layers;
        Ok(())
    }
}

/// Tensor names resolved against what the graph actually declares.
#[derive(Debug, Clone)]
struct IoNames {
    input_ids: String,
    attention_mask: String,
    position_ids: Option<String>,
    logits: String,
    past: Vec<(String, String)>,
    present: Vec<(String, String)>,
}

impl IoNames {
    fn resolve(config: &GenaiConfig, declared: &[String]) -> Result<Self, LlmError> {
        let decoder = &config.model.decoder;
        let layers = 0..decoder.num_hidden_layers;
        let names = Self {
            input_ids: decoder.inputs.input_ids.clone(),
            attention_mask: decoder.inputs.attention_mask.clone(),
            position_ids: declared
                .iter()
                .find(|n| **n == decoder.inputs.position_ids)
                .cloned(),
            logits: decoder.outputs.logits.clone(),
            past: layers
                .clone()
                .map(|l| {
                    (
                        layer_name(&decoder.inputs.past_key_names, l),
                        layer_name(&decoder.inputs.past_value_names, l),
                    )
                })
                .collect(),
            present: layers
                .map(|l| {
                    (
                        layer_name(&decoder.outputs.present_key_names, l),
                        layer_name(&decoder.outputs.present_value_names, l),
                    )
                })
                .collect(),
        };

        let required = [&names.input_ids, &names.attention_mask]
            .into_iter()
            .chain(names.past.iter().flat_map(|(k, v)| [k, v]));
        for name in required {
            if !declared.contains(name) {
                return Err(LlmError::InvalidConfig(format!(
                    "decoder graph has no input named '{name}'"
                )));
            }
        }
        Ok(names)
    }
}

/// A causal decoder graph loaded on one execution provider.
pub struct CausalLm {
    session: Session,
    config: GenaiConfig,
    names: IoNames,
    provider: ExecutionProvider,
}

impl CausalLm {
    /// Reads `genai_config.json` and opens the decoder it names.
    pub fn open(cfg: &GenerationConfig) -> Result<Self, LlmError> {
        let config = GenaiConfig::from_dir(&cfg.model_dir)?;
        let decoder_path = cfg.model_dir.join(&config.model.decoder.filename);
        let session = open_session(&decoder_path, cfg.provider, &cfg.session)?;
        let declared: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let names = IoNames::resolve(&config, &declared)?;

        info!(
            model_type = %config.model.model_type,
            layers = config.model.decoder.num_hidden_layers,
            position_ids = names.position_ids.is_some(),
            provider = %cfg.provider,
            "causal_lm_ready"
        );
        Ok(Self {
            session,
            config,
            names,
            provider: cfg.provider,
        })
    }

    /// Like [`CausalLm::open`] but an unusable accelerator yields
    /// [`Availability::Unavailable`].
    pub fn acquire(cfg: &GenerationConfig) -> Result<Availability<Self>, LlmError> {
        acquire(cfg.provider, |provider| Self::open(&cfg.with_provider(provider)))
    }

    pub fn config(&self) -> &GenaiConfig {
        &self.config
    }

    pub fn provider(&self) -> ExecutionProvider {
        self.provider
    }

    /// Starts a fresh generation. `max_length` is clamped to the model's context length.
    pub fn generator(&mut self, options: &SearchOptions) -> Result<OnnxGenerator<'_>, LlmError> {
        options.validate()?;
        let decoder = &self.config.model.decoder;
        let max_length = options.max_length.min(self.config.model.context_length);
        let cache = KvCache::empty(
            decoder.num_hidden_layers,
            decoder.num_key_value_heads,
            decoder.head_size,
        );
        let tracker = SequenceTracker::new(max_length, self.config.eos_token_ids());
        Ok(OnnxGenerator {
            sampler: Sampler::new(options),
            tracker,
            cache,
            model: self,
        })
    }

    /// Feeds `tokens` on top of `cache`, updates the cache and returns the
    /// logits row of the last token.
    fn forward(&mut self, tokens: &[u32], cache: &mut KvCache) -> Result<Vec<f32>, LlmError> {
        let past_len = cache.seq_len();
        let n = tokens.len();
        let mut inputs: Vec<(Cow<'static, str>, SessionInputValue<'static>)> =
            Vec::with_capacity(3 + 2 * cache.num_layers());

        let ids: Vec<i64> = tokens.iter().map(|&id| i64::from(id)).collect();
        inputs.push(int_input(&self.names.input_ids, n, ids)?);
        inputs.push(int_input(
            &self.names.attention_mask,
            past_len + n,
            vec![1; past_len + n],
        )?);
        if let Some(name) = &self.names.position_ids {
            let positions = (past_len as i64..(past_len + n) as i64).collect();
            inputs.push(int_input(name, n, positions)?);
        }
        let past = cache.take_layers();
        if past.len() != self.names.past.len() {
            return Err(LlmError::Inference(format!(
                "cache holds {} layers, model expects {}",
                past.len(),
                self.names.past.len()
            )));
        }
        for ((key_name, value_name), (key, value)) in self.names.past.iter().zip(past) {
            inputs.push(cache_input(key_name, key)?);
            inputs.push(cache_input(value_name, value)?);
        }

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| LlmError::Inference(e.to_string()))?;

        let logits = outputs.get(self.names.logits.as_str()).ok_or_else(|| {
            LlmError::Inference(format!("model returned no '{}' output", self.names.logits))
        })?;
        let (shape, data) = logits
            .try_extract_tensor::<f32>()
            .map_err(|e| LlmError::Inference(e.to_string()))?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        let last_row = match dims.as_slice() {
            [1, seq, vocab] if *seq as usize == n && *vocab > 0 => {
                let vocab = *vocab as usize;
                data[(n - 1) * vocab..n * vocab].to_vec()
            }
            _ => {
                return Err(LlmError::Inference(format!(
                    "expected logits shape [1, {n}, vocab], got {dims:?}"
                )))
            }
        };

        let extract_cache = |name: &str| -> Result<CacheTensor, LlmError> {
            let value = outputs
                .get(name)
                .ok_or_else(|| LlmError::Inference(format!("model returned no '{name}' output")))?;
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| LlmError::Inference(e.to_string()))?;
            let dims: Vec<i64> = shape.iter().copied().collect();
            CacheTensor::from_output(&dims, data)
        };
        let mut present = Vec::with_capacity(self.names.present.len());
        for (key_name, value_name) in &self.names.present {
            present.push((extract_cache(key_name)?, extract_cache(value_name)?));
        }
        cache.replace(present)?;

        debug!(fed = n, cached = cache.seq_len(), "decoder_forward");
        Ok(last_row)
    }
}

fn int_input(
    name: &str,
    len: usize,
    data: Vec<i64>,
) -> Result<(Cow<'static, str>, SessionInputValue<'static>), LlmError> {
    let tensor = Tensor::from_array(([1usize, len], data))
        .map_err(|e| LlmError::Inference(e.to_string()))?;
    Ok((Cow::Owned(name.to_string()), SessionInputValue::from(tensor)))
}

fn cache_input(
    name: &str,
    cache: CacheTensor,
) -> Result<(Cow<'static, str>, SessionInputValue<'static>), LlmError> {
    let tensor = Tensor::from_array((cache.shape, cache.data))
        .map_err(|e| LlmError::Inference(e.to_string()))?;
    Ok((Cow::Owned(name.to_string()), SessionInputValue::from(tensor)))
}

/// One generation over a [`CausalLm`]. Dropping it releases the KV cache and
/// leaves the model ready for the next prompt.
pub struct OnnxGenerator<'m> {
    model: &'m mut CausalLm,
    sampler: Sampler,
    tracker: SequenceTracker,
    cache: KvCache,
}

impl OnnxGenerator<'_> {
    pub fn generated(&self) -> usize {
        self.tracker.generated()
    }
}

impl GenerativeOracle for OnnxGenerator<'_> {
    fn append_tokens(&mut self, ids: &[u32]) -> Result<(), LlmError> {
        self.tracker.append(ids)
    }

    fn step(&mut self) -> Result<(), LlmError> {
        self.tracker.ensure_can_step()?;
        let pending = self.tracker.pending().to_vec();
        let logits = self.model.forward(&pending, &mut self.cache)?;
        let next = self.sampler.sample(&logits)?;
        self.tracker.push_generated(next);
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.tracker.is_done()
    }

    fn sequence(&self) -> &[u32] {
        self.tracker.tokens()
    }
}
