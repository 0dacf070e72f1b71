//! ROUGE-1 / ROUGE-2 / ROUGE-L
//!
//! 参考答案为外部模型回答，被评估答案为内部模型回答。
//! 分词：中日韩字符逐字切分，其余按字母数字连续串切分并转小写，标点丢弃。
//! 整段文本没有任何字母数字时，改为把每个非空白符号当作一个词。

use std::collections::HashMap;

/// 一次 ROUGE 计算的结果
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RougeScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl RougeScore {
    fn from_overlap(overlap: usize, candidate_total: usize, reference_total: usize) -> Self {
        if candidate_total == 0 || reference_total == 0 {
            return Self::default();
        }
        let precision = overlap as f64 / candidate_total as f64;
        let recall = overlap as f64 / reference_total as f64;
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            precision,
            recall,
            f1,
        }
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

/// 分词
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut symbols = Vec::new();
    let mut word = String::new();

    for c in text.chars() {
        if is_cjk(c) {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(c.to_string());
        } else if c.is_alphanumeric() {
            word.extend(c.to_lowercase());
        } else {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            if !c.is_whitespace() {
                symbols.push(c.to_string());
            }
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }

    // 纯标点 / 表情的回答（如 "？"）
    if tokens.is_empty() {
        symbols
    } else {
        tokens
    }
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

/// ROUGE-N，重叠按次数截断计算
pub fn rouge_n(reference: &str, candidate: &str, n: usize) -> RougeScore {
    let reference_tokens = tokenize(reference);
    let candidate_tokens = tokenize(candidate);

    let reference_counts = ngram_counts(&reference_tokens, n);
    let candidate_counts = ngram_counts(&candidate_tokens, n);

    let overlap: usize = candidate_counts
        .iter()
        .map(|(gram, count)| (*count).min(reference_counts.get(gram).copied().unwrap_or(0)))
        .sum();

    RougeScore::from_overlap(
        overlap,
        candidate_counts.values().sum(),
        reference_counts.values().sum(),
    )
}

/// 最长公共子序列长度，滚动数组只占 O(n) 内存
fn lcs_length(a: &[String], b: &[String]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            current[j + 1] = if x == y {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// ROUGE-L（基于最长公共子序列）
pub fn rouge_l(reference: &str, candidate: &str) -> RougeScore {
    let reference_tokens = tokenize(reference);
    let candidate_tokens = tokenize(candidate);
    let lcs = lcs_length(&reference_tokens, &candidate_tokens);
    RougeScore::from_overlap(lcs, candidate_tokens.len(), reference_tokens.len())
}
